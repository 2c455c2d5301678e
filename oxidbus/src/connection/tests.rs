use crate::message::SerialAllocator;
use crate::proto::MessageType;
use crate::router::MatchRule;

use super::ConnectOptions;

#[test]
fn serials_start_at_one_and_increase() {
    let mut serials = SerialAllocator::new();
    assert_eq!(serials.next().get(), 1);
    assert_eq!(serials.next().get(), 2);
    assert_eq!(serials.next().get(), 3);
}

#[test]
fn match_rule_signals_restricts_only_the_message_type() {
    let rule = MatchRule::signals();
    assert_eq!(rule.message_type, Some(MessageType::SIGNAL));
    assert!(rule.sender.is_none());
    assert!(rule.interface.is_none());
}

#[test]
fn connect_options_builder_is_chainable() {
    let options = ConnectOptions::new()
        .address("unix:path=/tmp/bus")
        .negotiate_unix_fd(true);
    assert_eq!(options, ConnectOptions::new().address("unix:path=/tmp/bus").negotiate_unix_fd(true));
}
