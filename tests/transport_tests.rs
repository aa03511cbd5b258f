mod common;

use common::MockLink;
use embassy_futures::block_on;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use sensor_hub::drivers::ad7746::ConversionTime;
use sensor_hub::drivers::pca9536::RelayPosition;
use sensor_hub::protocol::{Command, InvalidCommand, TelemetryFrame};
use sensor_hub::state::Hub;
use sensor_hub::tasks::{Outcome, Transport};
use sensor_hub::CHANNEL_COUNT;

type TestHub = Hub<CriticalSectionRawMutex>;

#[test]
fn ships_a_snapshot_of_the_frame() {
    let hub = TestHub::new();
    let mut transport = Transport::new(MockLink::default(), &hub);

    block_on(async {
        hub.telemetry.write_header().await;
        hub.telemetry.update(2, |b| b.humidity = [0x12, 0x34]).await;
        assert_eq!(transport.transact().await, Ok(Outcome::Idle));
    });

    let sent = TelemetryFrame::from_bytes(&transport.link().sent[0]);
    assert!(sent.has_valid_header());
    assert_eq!(sent.channels[2].humidity, [0x12, 0x34]);
}

#[test]
fn relay_mask_zero_switches_every_channel_to_new() {
    let hub = TestHub::new();
    let mut link = MockLink::default();
    link.reply_with_command([1, 1, 1, 0]);
    let mut transport = Transport::new(link, &hub);

    let outcome = block_on(transport.transact());
    assert_eq!(outcome, Ok(Outcome::Applied(Command::RelayMask(0))));
    for ch in 0..CHANNEL_COUNT {
        assert_eq!(hub.params.take_relay_request(ch), Some(RelayPosition::New));
    }
}

#[test]
fn relay_mask_selects_channels_individually() {
    let hub = TestHub::new();
    let mut link = MockLink::default();
    link.reply_with_command([1, 1, 1, 0b000101]);
    let mut transport = Transport::new(link, &hub);

    block_on(transport.transact()).unwrap();
    let targets: Vec<_> = (0..CHANNEL_COUNT)
        .map(|ch| hub.params.take_relay_request(ch))
        .collect();
    assert_eq!(
        targets,
        vec![
            Some(RelayPosition::New),
            Some(RelayPosition::Old),
            Some(RelayPosition::New),
            Some(RelayPosition::Old),
            Some(RelayPosition::Old),
            Some(RelayPosition::Old),
        ]
    );
}

#[test]
fn mode_commands_update_parameters() {
    let hub = TestHub::new();
    let mut link = MockLink::default();
    link.reply_with_command([1, 3, 3, 0xFF]);
    link.reply_with_command([1, 2, 3, 0x00]);
    link.reply_with_command([1, 3, 7, 0x00]);
    link.reply_with_command([1, 0, 1, 1]);
    let mut transport = Transport::new(link, &hub);

    block_on(async {
        transport.transact().await.unwrap();
        assert!(hub.params.full_set(3));

        transport.transact().await.unwrap();
        assert!(!hub.params.full_set(3));

        transport.transact().await.unwrap();
        assert!(hub.params.full_set(0));

        transport.transact().await.unwrap();
        assert_eq!(hub.params.conversion_time(), ConversionTime::Fast);
    });
}

#[test]
fn invalid_command_changes_nothing() {
    let hub = TestHub::new();
    let mut link = MockLink::default();
    link.reply_with_command([1, 9, 9, 9]);
    let mut transport = Transport::new(link, &hub);

    let outcome = block_on(transport.transact());
    assert_eq!(outcome, Ok(Outcome::Rejected(InvalidCommand([1, 9, 9, 9]))));
    assert_eq!(hub.params.conversion_time(), ConversionTime::Default);
    assert!((0..CHANNEL_COUNT).all(|ch| !hub.params.full_set(ch) && !hub.params.relay_pending(ch)));
}

#[test]
fn failed_exchange_discards_partial_input() {
    let hub = TestHub::new();
    let mut link = MockLink::default();
    link.fail_next = true;
    let mut transport = Transport::new(link, &hub);

    block_on(async {
        assert_eq!(transport.transact().await, Err("link down"));
        assert_eq!(transport.transact().await, Ok(Outcome::Idle));
    });
    assert!(!hub.params.relay_pending(0));
    assert_eq!(transport.link().sent.len(), 2);
}
