//! The UPnP device description and the other fixed documents
use crate::http::{Method, Response};
use crate::identity::DeviceIdentity;
use quick_xml::escape::escape;

/// Where SSDP `LOCATION` points
pub const DESCRIPTION_PATH: &str = "/";

/// Answer to `GET /query/apps`
pub const APPS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" ?>
<apps>
  <app id="1" version="1.0.0">Emulated App 1</app>
  <app id="2" version="1.0.0">Emulated App 2</app>
</apps>
"#;

/// Answer to `GET /query/active-app`
pub const ACTIVE_APP_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" ?>
<active-app>
  <app>Roku</app>
</active-app>
"#;

/// A 1x1 transparent PNG, served for every app icon
pub const ICON_PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D,
    0x49, 0x48, 0x44, 0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01,
    0x08, 0x06, 0x00, 0x00, 0x00, 0x1F, 0x15, 0xC4, 0x89, 0x00, 0x00, 0x00,
    0x0A, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00, 0x01, 0x00, 0x00,
    0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49,
    0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
];

/// Render the root device description
#[must_use]
pub fn render_description(identity: &DeviceIdentity) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" ?>
<root xmlns="urn:schemas-upnp-org:device-1-0">
  <specVersion>
    <major>1</major>
    <minor>0</minor>
  </specVersion>
  <device>
    <deviceType>urn:roku-com:device:player:1-0</deviceType>
    <friendlyName>{name}</friendlyName>
    <manufacturer>Roku</manufacturer>
    <manufacturerURL>http://www.roku.com/</manufacturerURL>
    <modelDescription>Roku Streaming Player Network Media</modelDescription>
    <modelName>{model}</modelName>
    <modelNumber>{model_number}</modelNumber>
    <modelURL>http://www.roku.com/</modelURL>
    <serialNumber>{serial}</serialNumber>
    <UDN>{udn}</UDN>
    <serviceList>
      <service>
        <serviceType>urn:roku-com:service:ecp:1</serviceType>
        <serviceId>urn:roku-com:serviceId:ecp1-0</serviceId>
        <controlURL/>
        <eventSubURL/>
        <SCPDURL>ecp_SCPD.xml</SCPDURL>
      </service>
    </serviceList>
  </device>
</root>
"#,
        name = escape(identity.device_name()),
        model = identity.model(),
        model_number = identity.model_number(),
        serial = identity.serial(),
        udn = identity.unique_service_name(),
    )
}

/// Render the answer to `GET /query/device-info`
#[must_use]
pub fn render_device_info(identity: &DeviceIdentity) -> String {
    let name = escape(identity.device_name());
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" ?>
<device-info>
  <udn>{uuid}</udn>
  <serial-number>{serial}</serial-number>
  <device-id>{serial}</device-id>
  <advertising-id>{uuid}</advertising-id>
  <vendor-name>Roku</vendor-name>
  <model-number>{model_number}</model-number>
  <model-name>{model}</model-name>
  <model-region>US</model-region>
  <is-tv>false</is-tv>
  <is-stick>false</is-stick>
  <supports-ethernet>true</supports-ethernet>
  <wifi-mac>{mac}</wifi-mac>
  <ethernet-mac>{mac}</ethernet-mac>
  <network-type>ethernet</network-type>
  <friendly-device-name>{name}</friendly-device-name>
  <friendly-model-name>{model}</friendly-model-name>
  <default-device-name>{name}</default-device-name>
  <user-device-name>{name}</user-device-name>
  <software-version>9.4.0</software-version>
  <software-build>4170</software-build>
  <secure-device>false</secure-device>
  <language>en</language>
  <country>US</country>
  <locale>en_US</locale>
  <power-mode>PowerOn</power-mode>
  <supports-find-remote>false</supports-find-remote>
  <developer-enabled>false</developer-enabled>
  <search-enabled>false</search-enabled>
  <voice-search-enabled>false</voice-search-enabled>
</device-info>
"#,
        uuid = identity.uuid(),
        serial = identity.serial(),
        model = identity.model(),
        model_number = identity.model_number(),
        mac = identity.mac(),
    )
}

/// Serves the device description at [`DESCRIPTION_PATH`]
///
/// Rendered once: the identity cannot change after setup.
#[derive(Debug, Clone)]
pub struct DescriptionServer {
    document: String,
}

impl DescriptionServer {
    /// Render the description for `identity`
    #[must_use]
    pub fn new(identity: &DeviceIdentity) -> Self {
        Self {
            document: render_description(identity),
        }
    }

    /// 200 with the description for `GET /`, otherwise 404
    #[must_use]
    pub fn handle_request(&self, method: &Method, path: &str) -> Response {
        if *method == Method::Get && path == DESCRIPTION_PATH {
            Response::xml(self.document.clone())
        } else {
            Response::not_found()
        }
    }
}

#[cfg(test)]
#[path = "tests/description.rs"]
mod tests;
