use super::*;
use mockall::Sequence;
use std::cell::RefCell;
use std::rc::Rc;

fn home() -> KeyEvent {
    KeyEvent::new(KeyEventType::KeyPress, "Home")
}

struct Panicker;

impl KeyListener for Panicker {
    fn notify(&self, _: &str, _: &str) -> Result<(), ListenerError> {
        panic!("listener exploded");
    }
}

#[test]
fn event_type_names() {
    assert_eq!(KeyEventType::KeyDown.as_str(), "keydown");
    assert_eq!(KeyEventType::KeyUp.as_str(), "keyup");
    assert_eq!(KeyEventType::KeyPress.as_str(), "keypress");
    assert_eq!(format!("{}", KeyEventType::KeyPress), "keypress");
}

#[test]
fn event_type_parses() {
    assert_eq!("keyup".parse::<KeyEventType>(), Ok(KeyEventType::KeyUp));
    assert_eq!(
        "keyclick".parse::<KeyEventType>(),
        Err(UnknownEventType("keyclick".to_string()))
    );
    assert_eq!(
        format!("{}", UnknownEventType("x".to_string())),
        "unknown key event type \"x\""
    );
}

#[test]
fn empty_dispatcher() {
    let d = Dispatcher::new();
    assert!(d.is_empty());
    assert_eq!(d.emit(&home()), DispatchOutcome::default());
}

#[test]
fn listeners_called_in_registration_order() {
    let mut seq = Sequence::new();
    let mut first = MockKeyListener::new();
    let mut second = MockKeyListener::new();
    let mut third = MockKeyListener::new();
    first
        .expect_notify()
        .withf(|t, k| t == "keypress" && k == "Home")
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(()));
    second
        .expect_notify()
        .withf(|t, k| t == "keypress" && k == "Home")
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(()));
    third
        .expect_notify()
        .withf(|t, k| t == "keypress" && k == "Home")
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(()));

    let mut d = Dispatcher::new();
    d.register(Box::new(first));
    d.register(Box::new(second));
    d.register(Box::new(third));
    assert_eq!(d.len(), 3);

    let outcome = d.emit(&home());
    assert_eq!(
        outcome,
        DispatchOutcome {
            delivered: 3,
            failed: 0
        }
    );
}

#[test]
fn failing_listener_does_not_stop_the_rest() {
    let mut seq = Sequence::new();
    let mut first = MockKeyListener::new();
    let mut second = MockKeyListener::new();
    first
        .expect_notify()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Err("no such light".into()));
    second
        .expect_notify()
        .withf(|t, k| t == "keydown" && k == "Lit_a")
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(()));

    let mut d = Dispatcher::new();
    d.register(Box::new(first));
    d.register(Box::new(second));

    let outcome = d.emit(&KeyEvent::new(KeyEventType::KeyDown, "Lit_a"));
    assert_eq!(
        outcome,
        DispatchOutcome {
            delivered: 1,
            failed: 1
        }
    );
}

#[test]
fn panicking_listener_does_not_stop_the_rest() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let seen2 = seen.clone();

    let mut d = Dispatcher::new();
    d.register(Box::new(Panicker));
    d.register(Box::new(move |t: &str, k: &str| {
        seen2.borrow_mut().push(format!("{t}/{k}"));
    }));

    let outcome = d.emit(&home());
    assert_eq!(outcome.failed, 1);
    assert_eq!(outcome.delivered, 1);
    assert_eq!(*seen.borrow(), vec!["keypress/Home".to_string()]);

    // Still usable afterwards
    d.emit(&KeyEvent::new(KeyEventType::KeyUp, "Select"));
    assert_eq!(seen.borrow().len(), 2);
}

#[test]
fn closure_listener_sees_decoded_key() {
    let seen = Rc::new(RefCell::new(None));
    let seen2 = seen.clone();

    let mut d = Dispatcher::new();
    d.register(Box::new(move |t: &str, k: &str| {
        *seen2.borrow_mut() = Some((t.to_string(), k.to_string()));
    }));

    d.emit(&KeyEvent::new(KeyEventType::KeyPress, "Lit_ "));
    assert_eq!(
        *seen.borrow(),
        Some(("keypress".to_string(), "Lit_ ".to_string()))
    );
}

#[test]
fn debug_shows_listener_count() {
    let mut d = Dispatcher::new();
    d.register(Box::new(|_: &str, _: &str| {}));
    assert_eq!(format!("{d:?}"), "Dispatcher { listeners: 1 }");
}
