use hand_control::protocol::{
    frame::Frame, pack_joint_words, Generation, JointFeedback, RegisterName,
};
use hand_control::transport::MockLine;
use hand_control::{HandController, HandError, MetricsHub, SerialConfig, SerialHand, SerialTiming};

fn hand(generation: Generation) -> (SerialHand<MockLine>, MockLine) {
    let config = SerialConfig {
        timing: SerialTiming::immediate(),
        ..SerialConfig::default()
    };
    let line = MockLine::new();
    let mut hand = SerialHand::new(config, generation);
    hand.attach(line.clone());
    (hand, line)
}

/// A read reply as the device sends it: swapped header, payload from byte 7.
fn reply(address: u16, payload: &[u8]) -> Vec<u8> {
    let mut bytes = vec![0x90, 0xEB, 0x01, (payload.len() + 3) as u8, 0x11];
    bytes.extend_from_slice(&address.to_le_bytes());
    bytes.extend_from_slice(payload);
    bytes.push(0x00);
    bytes
}

#[test]
fn wrong_length_vectors_send_nothing() {
    let (mut hand, line) = hand(Generation::Gen3);
    for values in [&[0, 0, 0, 0, 0][..], &[0, 0, 0, 0, 0, 0, 0][..]] {
        assert!(matches!(hand.set_angle(values), Err(HandError::Validation(_))));
        assert!(matches!(hand.set_force(values), Err(HandError::Validation(_))));
    }
    assert!(line.written().is_empty());
}

#[test]
fn out_of_range_and_sentinel_rejected_on_serial() {
    let (mut hand, line) = hand(Generation::Gen3);
    assert!(matches!(
        hand.set_speed(&[0, 0, 0, 0, 0, 1001]),
        Err(HandError::Validation(_))
    ));
    assert!(matches!(
        hand.set_angle(&[-1, 0, 0, 0, 0, 0]),
        Err(HandError::Validation(_))
    ));
    assert!(line.written().is_empty());
}

#[test]
fn open_sends_bit_exact_angle_frame() {
    let (mut hand, line) = hand(Generation::Gen3);
    hand.perform_open().unwrap();
    let expected = Frame::encode_write(1, 1486, &pack_joint_words([1000; 6])).unwrap();
    assert_eq!(line.written(), vec![expected.into_bytes()]);
}

#[test]
fn write_acknowledgement_is_drained() {
    let (mut hand, line) = hand(Generation::Gen3);
    line.push_reply(vec![0x90, 0xEB, 0x01, 0x04, 0x12, 0xEC, 0x03, 0x01, 0x05]);
    hand.reset_error().unwrap();
    assert_eq!(line.pending_rx(), 0);
    let sent = &line.written()[0];
    assert_eq!(&sent[..8], &[0xEB, 0x90, 0x01, 0x04, 0x12, 0xEC, 0x03, 0x01]);
}

#[test]
fn angle_feedback_decodes_unsigned_words() {
    let (mut hand, line) = hand(Generation::Gen3);
    let words = [0, 250, 500, 750, 1000, 0xFFFF];
    line.push_reply(reply(1546, &pack_joint_words(words)));
    assert_eq!(hand.get_angle_actual().unwrap(), JointFeedback(words));
    assert_eq!(
        line.written()[0],
        Frame::encode_read(1, 1546, 12).into_bytes()
    );
}

#[test]
fn byte_registers_read_six_bytes() {
    let (mut hand, line) = hand(Generation::Gen3);
    line.push_reply(reply(1618, &[30, 31, 32, 33, 34, 35]));
    assert_eq!(hand.get_temperature().unwrap(), [30, 31, 32, 33, 34, 35]);
    assert_eq!(line.written()[0][7], 6);
}

#[test]
fn truncated_reply_is_a_short_read() {
    let hub = MetricsHub::new().unwrap();
    let (hand, line) = hand(Generation::Gen3);
    let mut hand = hand.with_metrics(hub.clone());
    let mut bytes = reply(1582, &pack_joint_words([1; 6]));
    bytes.truncate(7 + 5);
    line.push_reply(bytes);
    assert!(matches!(
        hand.get_force_actual(),
        Err(HandError::ShortRead { expected: 12, actual: 5 })
    ));
    assert_eq!(hub.hand.short_reads.get(), 1);
}

#[test]
fn tactile_is_unsupported_over_serial() {
    let (mut hand, line) = hand(Generation::Gen4);
    assert!(matches!(
        hand.get_tactile_frame(),
        Err(HandError::UnsupportedCapability(_))
    ));
    assert!(line.written().is_empty());
}

#[test]
fn action_sequences_exist_only_on_gen3() {
    let (mut gen3, line) = hand(Generation::Gen3);
    gen3.set_action_sequence(2).unwrap();
    gen3.run_action_sequence().unwrap();
    let sent = line.written();
    assert_eq!(&sent[0][5..8], &[0x10, 0x09, 2]);
    assert_eq!(&sent[1][5..8], &[0x12, 0x09, 1]);

    let (mut gen4, line) = hand(Generation::Gen4);
    assert!(matches!(
        gen4.run_action_sequence(),
        Err(HandError::UnknownRegister {
            name: RegisterName::ActionSeqRun,
            generation: Generation::Gen4
        })
    ));
    assert!(line.written().is_empty());
}

#[test]
fn disconnect_is_idempotent_and_blocks_io() {
    let (mut hand, line) = hand(Generation::Gen3);
    assert!(hand.is_connected());
    hand.disconnect().unwrap();
    hand.disconnect().unwrap();
    assert!(line.is_closed());
    assert!(!hand.is_connected());
    assert!(matches!(hand.perform_close(), Err(HandError::NotConnected)));
    assert!(matches!(hand.validate_registers(), Err(HandError::NotConnected)));

    let mut never = SerialHand::<MockLine>::new(SerialConfig::default(), Generation::Gen3);
    never.disconnect().unwrap();
}

#[test]
fn validation_sweep_reports_per_register() {
    let (mut hand, line) = hand(Generation::Gen3);
    line.push_reply(reply(1000, &[1]));
    line.push_reply(reply(1546, &[0; 12]));
    line.push_reply(reply(1534, &[0; 12]));
    // FORCE_ACT gets no reply at all.
    line.push_reply(Vec::new());
    line.push_reply(reply(1594, &[0; 12]));
    line.push_reply(reply(1606, &[0; 6]));
    line.push_reply(reply(1612, &[0; 6]));
    line.push_reply(reply(1618, &[0; 6]));

    let results = hand.validate_registers().unwrap();
    assert_eq!(results.len(), 8);
    assert!(results[&RegisterName::HandId]);
    assert!(!results[&RegisterName::ForceAct]);
    assert_eq!(results.values().filter(|ok| **ok).count(), 7);
}

#[test]
fn stale_acknowledgement_does_not_corrupt_next_read() {
    let (mut hand, line) = hand(Generation::Gen3);
    // A late write acknowledgement still sitting on the line.
    line.inject_rx(&[0x90, 0xEB, 0x01, 0x04, 0x12, 0xEC, 0x03, 0x01, 0x05]);
    line.push_reply(reply(1546, &pack_joint_words([7, 8, 9, 10, 11, 12])));
    assert_eq!(
        hand.get_angle_actual().unwrap(),
        JointFeedback([7, 8, 9, 10, 11, 12])
    );
    assert_eq!(line.pending_rx(), 0);
}

#[test]
fn hand_id_selects_the_addressed_device() {
    let (mut hand, line) = hand(Generation::Gen3);
    hand.set_hand_id(7);
    assert_eq!(hand.hand_id(), 7);
    hand.reset_error().unwrap();
    let expected = Frame::encode_write(7, 1004, &[1]).unwrap();
    assert_eq!(line.written(), vec![expected.into_bytes()]);
}

#[test]
fn raw_register_reads_are_sized_by_layout() {
    let (mut hand, line) = hand(Generation::Gen4);
    line.push_reply(reply(1618, &[40, 41, 42, 43, 44, 45]));
    assert_eq!(
        hand.read_register(RegisterName::Temp).unwrap(),
        vec![40, 41, 42, 43, 44, 45]
    );
    assert_eq!(line.written()[0], Frame::encode_read(1, 1618, 6).into_bytes());

    assert!(matches!(
        hand.read_register(RegisterName::PalmTac),
        Err(HandError::UnsupportedCapability(_))
    ));
    assert_eq!(line.written().len(), 1);
}

#[test]
fn connect_opens_the_configured_port() {
    let mut hand = SerialHand::<MockLine>::new(SerialConfig::default(), Generation::Gen3);
    assert!(!hand.is_connected());
    hand.connect().unwrap();
    assert!(hand.is_connected());
    hand.disconnect().unwrap();
    assert!(!hand.is_connected());
}

#[test]
fn transport_faults_are_retryable_validation_is_not() {
    let (mut hand, line) = hand(Generation::Gen3);
    line.push_reply(Vec::new());
    let short = hand.get_force_actual().unwrap_err();
    assert!(short.is_transient());

    let invalid = hand.set_angle(&[0; 5]).unwrap_err();
    assert!(!invalid.is_transient());

    hand.disconnect().unwrap();
    assert!(!hand.perform_open().unwrap_err().is_transient());
}
