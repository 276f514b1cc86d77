//! External Control Protocol: the HTTP side of the emulated device
//!
//! Requests arrive as parsed heads (see [`parser`]), are mapped onto
//! a [`Command`] and answered. Key commands are handed to the
//! [`Dispatcher`]; everything else is answered from fixed documents.
use crate::description::{
    render_device_info, DescriptionServer, ACTIVE_APP_XML, APPS_XML, DESCRIPTION_PATH,
    ICON_PNG,
};
use crate::dispatch::Dispatcher;
use crate::http::{Request, Response};
use crate::identity::DeviceIdentity;
use tracing::{debug, info};

mod command;
mod parser;

pub use command::{decode_segment, route, Command, UnsupportedCommand};
pub use parser::{ParseError, RequestParser, State, MAX_HEAD, MAX_REQUEST_LINE};

/// Answers ECP requests for one device identity
#[derive(Debug, Clone)]
pub struct CommandServer {
    description: DescriptionServer,
    device_info: String,
}

impl CommandServer {
    /// Render the per-device documents
    #[must_use]
    pub fn new(identity: &DeviceIdentity) -> Self {
        Self {
            description: DescriptionServer::new(identity),
            device_info: render_device_info(identity),
        }
    }

    /// Produce the response to one request
    ///
    /// Key events reach every listener before this returns.
    pub fn handle(&self, request: &Request, dispatcher: &Dispatcher) -> Response {
        match route(request) {
            Ok(Command::Key(event)) => {
                info!("{}: {}", event.event_type, event.key);
                let outcome = dispatcher.emit(&event);
                debug!(
                    delivered = outcome.delivered,
                    failed = outcome.failed,
                    "key event dispatched"
                );
                Response::ok()
            }
            Ok(Command::Description) => self
                .description
                .handle_request(&request.method, DESCRIPTION_PATH),
            Ok(Command::QueryApps) => Response::xml(APPS_XML),
            Ok(Command::QueryActiveApp) => Response::xml(ACTIVE_APP_XML),
            Ok(Command::QueryDeviceInfo) => Response::xml(self.device_info.clone()),
            Ok(Command::QueryIcon(_)) => Response::binary("image/png", ICON_PNG),
            Ok(Command::Launch(app)) => {
                info!(app = %app, "launch requested");
                Response::ok()
            }
            Ok(Command::Input | Command::Search) => Response::ok(),
            Err(e) => {
                debug!("{e}");
                Response::not_found()
            }
        }
    }
}

#[cfg(test)]
#[path = "../tests/ecp.rs"]
mod tests;
