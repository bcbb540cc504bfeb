//! Integration tests driving a full `Session` against a scripted bus.
//!
//! The fake bus plays the module's side of the handshake: it captures
//! every frame the host clocks out and answers each exchange with the
//! next scripted frame (or an all-zero frame when the script is
//! empty).

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use zncp_driver::{ApplicationConfig, Bus, ModuleConfig, Session, WaitStrategy};
use zncp_protocol::*;

// ===== fakes =====

#[derive(Default)]
struct BusState {
    script: VecDeque<Vec<u8>>,
    sent: Vec<Vec<u8>>,
    response: Vec<u8>,
    accept: bool,
    selected: bool,
    phase: u8,
    transfers: u64,
    resets: u64,
}

/// Scripted module double. Cloning shares the state so tests can
/// inspect traffic after the session has taken ownership of the bus.
#[derive(Clone)]
struct FakeBus(Rc<RefCell<BusState>>);

impl FakeBus {
    fn new() -> Self {
        FakeBus(Rc::new(RefCell::new(BusState {
            accept: true,
            ..BusState::default()
        })))
    }

    /// A module that never asserts ready.
    fn unresponsive() -> Self {
        FakeBus(Rc::new(RefCell::new(BusState::default())))
    }

    fn queue(&self, command: u16, payload: &[u8]) {
        self.0.borrow_mut().script.push_back(wire(command, payload));
    }

    fn sent(&self) -> Vec<Vec<u8>> {
        self.0.borrow().sent.clone()
    }

    fn transfers(&self) -> u64 {
        self.0.borrow().transfers
    }

    fn resets(&self) -> u64 {
        self.0.borrow().resets
    }
}

impl Bus for FakeBus {
    fn set_select(&mut self, asserted: bool) {
        let mut state = self.0.borrow_mut();
        state.selected = asserted;
        if asserted {
            state.phase = 0;
        }
    }

    fn ready(&mut self) -> bool {
        let state = self.0.borrow();
        if state.selected {
            // asserted while willing to accept a request; deasserted
            // once the response is staged
            state.phase == 0 && state.accept
        } else {
            !state.script.is_empty()
        }
    }

    fn transfer(&mut self, buf: &mut [u8]) {
        let mut state = self.0.borrow_mut();
        state.transfers += 1;
        match state.phase {
            0 => {
                state.sent.push(buf.to_vec());
                state.response = state
                    .script
                    .pop_front()
                    .unwrap_or_else(|| vec![0, 0, 0]);
                state.phase = 1;
            }
            1 => {
                buf.copy_from_slice(&state.response[..3]);
                state.phase = 2;
            }
            _ => {
                let len = buf.len();
                buf.copy_from_slice(&state.response[3..3 + len]);
            }
        }
    }

    fn reset(&mut self) {
        self.0.borrow_mut().resets += 1;
    }
}

/// Wait strategy that never actually waits; counts notification-loop
/// sleeps so timeout bounds can be asserted exactly.
#[derive(Clone, Default)]
struct TestWait {
    sleeps: Rc<Cell<u64>>,
}

impl WaitStrategy for TestWait {
    fn wait_until(&mut self, _budget: Duration, cond: &mut dyn FnMut() -> bool) -> bool {
        for _ in 0..8 {
            if cond() {
                return true;
            }
        }
        false
    }

    fn sleep(&mut self, _interval: Duration) {
        self.sleeps.set(self.sleeps.get() + 1);
    }
}

fn wire(command: u16, payload: &[u8]) -> Vec<u8> {
    let mut frame = Frame::new();
    frame.set(command, payload).unwrap();
    frame.wire().to_vec()
}

fn session(bus: &FakeBus) -> Session<FakeBus, TestWait> {
    Session::new(bus.clone(), TestWait::default())
}

// ===== validation =====

#[test]
fn validation_failures_never_touch_the_bus() {
    let bus = FakeBus::new();
    let mut session = session(&bus);

    assert_eq!(
        session.send_data(ShortAddress(0x0001), 1, 1, 0, b"x"),
        Err(ModuleError::InvalidCluster)
    );
    assert_eq!(
        session.send_data(ShortAddress(0x0001), 1, 1, 7, &[0u8; 82]),
        Err(ModuleError::InvalidLength {
            max: MAX_PAYLOAD_LENGTH,
            actual: 82,
        })
    );
    assert_eq!(session.set_channel(26), Err(ModuleError::InvalidParameter));
    assert_eq!(
        session.ieee_address(ShortAddress(0x0001), 9, 0),
        Err(ModuleError::InvalidParameter)
    );
    let bad_app = ApplicationConfig {
        endpoint: 0,
        ..ApplicationConfig::default()
    };
    assert_eq!(
        session.register_application(&bad_app),
        Err(ModuleError::InvalidParameter)
    );
    assert_eq!(
        session.send_data_extended(Destination::Broadcast, 1, 1, 7, &[]),
        Err(ModuleError::InvalidLength {
            max: MAX_EXT_TOTAL_PAYLOAD_LENGTH,
            actual: 0,
        })
    );

    assert_eq!(bus.transfers(), 0);
    assert_eq!(bus.resets(), 0);
}

// ===== wire layout =====

#[test]
fn send_data_reproduces_the_wire_layout() {
    let bus = FakeBus::new();
    bus.queue(srsp_id(AF_DATA_REQUEST), &[STATUS_SUCCESS]);
    bus.queue(AF_DATA_CONFIRM, &[STATUS_SUCCESS, 0xD7, 0x01]);

    let mut session = session(&bus);
    session
        .send_data(ShortAddress(0x1234), 0xD7, 0xD7, 0x0007, &[0x01, 0x02, 0x03])
        .unwrap();

    let sent = bus.sent();
    assert_eq!(
        sent[0],
        vec![
            13, 0x24, 0x01, // length 10+3, AF_DATA_REQUEST MSB first
            0x34, 0x12, // destination, LSB first
            0xD7, 0xD7, // destination and source endpoints
            0x07, 0x00, // cluster
            0x01, // transaction sequence
            0x00, // options: next-hop ack
            0x0F, // radius
            0x03, // data length
            0x01, 0x02, 0x03,
        ]
    );
    // confirm fetched with a poll: all-zero header
    assert_eq!(sent[1], vec![0, 0, 0]);
}

#[test]
fn aps_ack_mode_changes_the_options_byte() {
    let bus = FakeBus::new();
    bus.queue(srsp_id(AF_DATA_REQUEST), &[STATUS_SUCCESS]);
    bus.queue(AF_DATA_CONFIRM, &[STATUS_SUCCESS, 0x01, 0x01]);

    let mut session = session(&bus);
    session.set_ack_mode(AckMode::Aps);
    session
        .send_data(ShortAddress(0x0002), 0x01, 0x01, 0x0007, b"a")
        .unwrap();

    assert_eq!(bus.sent()[0][10], 0x10);
}

// ===== notification waiting =====

#[test]
fn wait_for_ignores_decoy_indications() {
    let bus = FakeBus::new();
    // a join announce and a state change arrive first
    bus.queue(
        ZDO_END_DEVICE_ANNCE_IND,
        &[
            0x00, 0x00, 0x56, 0x34, 1, 2, 3, 4, 5, 6, 7, 8, CAPABILITY_ROUTER,
        ],
    );
    bus.queue(ZDO_STATE_CHANGE_IND, &[0x07]);
    bus.queue(AF_DATA_CONFIRM, &[STATUS_SUCCESS, 0xD7, 0x2A]);

    let mut session = session(&bus);
    let incoming = session
        .wait_for(AF_DATA_CONFIRM, Duration::from_secs(1))
        .unwrap();
    assert_eq!(
        incoming,
        Incoming::DataConfirm(DataConfirm {
            status: STATUS_SUCCESS,
            endpoint: 0xD7,
            sequence: 0x2A,
        })
    );
    // every decoy was fetched, classified, and dropped
    assert_eq!(bus.sent().len(), 3);
}

#[test]
fn notification_timeout_is_a_fixed_poll_count() {
    let bus = FakeBus::new();
    let wait = TestWait::default();
    let mut session = Session::new(bus.clone(), wait.clone());

    assert_eq!(
        session.wait_for(AF_DATA_CONFIRM, Duration::from_secs(2)),
        Err(ModuleError::Timeout)
    );
    // 2 s at a 100 ms poll interval: exactly 20 sleeps, no transfers
    assert_eq!(wait.sleeps.get(), 20);
    assert_eq!(bus.transfers(), 0);
}

// ===== transport failures =====

#[test]
fn transport_failure_resets_the_bus_once() {
    let bus = FakeBus::unresponsive();
    let mut session = session(&bus);

    assert_eq!(session.version(), Err(ModuleError::ChipSelectTimeout));
    assert_eq!(bus.resets(), 1);
}

#[test]
fn mismatched_srsp_resets_the_bus_once() {
    let bus = FakeBus::new();
    bus.queue(srsp_id(ZB_WRITE_CONFIGURATION), &[STATUS_SUCCESS]);

    let mut session = session(&bus);
    assert_eq!(
        session.version(),
        Err(ModuleError::IncorrectSrsp {
            expected: srsp_id(SYS_VERSION),
            received: srsp_id(ZB_WRITE_CONFIGURATION),
        })
    );
    assert_eq!(bus.resets(), 1);
}

#[test]
fn truncated_response_is_a_decode_error_not_a_transport_failure() {
    let bus = FakeBus::new();
    // SYS_VERSION answers with 5 identification bytes; deliver 2
    bus.queue(srsp_id(SYS_VERSION), &[0x02, 0x5E]);

    let mut session = session(&bus);
    let error = session.version().unwrap_err();
    assert_eq!(error, ModuleError::MalformedResponse);
    assert!(!error.is_transport());
    assert_eq!(bus.resets(), 0);
}

#[test]
fn nonzero_status_byte_becomes_the_error() {
    let bus = FakeBus::new();
    bus.queue(srsp_id(ZB_WRITE_CONFIGURATION), &[0xC8]);

    let mut session = session(&bus);
    assert_eq!(
        session.set_pan_id(0x1A2B),
        Err(ModuleError::Status(0xC8))
    );
    // a module-reported failure is not a transport failure
    assert_eq!(bus.resets(), 0);
}

// ===== fragmentation =====

#[test]
fn extended_send_fragments_as_247_247_106() {
    let data: Vec<u8> = (0..600).map(|i| (i % 251) as u8).collect();
    let bus = FakeBus::new();
    bus.queue(srsp_id(AF_DATA_REQUEST_EXT), &[STATUS_SUCCESS]);
    for _ in 0..4 {
        bus.queue(srsp_id(AF_DATA_STORE), &[STATUS_SUCCESS]);
    }
    bus.queue(AF_DATA_CONFIRM, &[STATUS_SUCCESS, 0x01, 0x01]);

    let mut session = session(&bus);
    let target = IeeeAddress([1, 2, 3, 4, 5, 6, 7, 8]);
    session
        .send_data_extended(Destination::Long(target), 0x01, 0x01, 0x0007, &data)
        .unwrap();

    let sent = bus.sent();
    // header-only extended request: 20 metadata bytes, no data
    assert_eq!(sent[0][0], 20);
    assert_eq!(&sent[0][1..3], &[0x24, 0x02]);
    assert_eq!(&sent[0][21..23], &600u16.to_le_bytes()); // total length

    // stores carry (offset, length) then the chunk
    let stores: Vec<(u16, u8)> = sent[1..5]
        .iter()
        .map(|frame| (u16::from_le_bytes([frame[3], frame[4]]), frame[5]))
        .collect();
    assert_eq!(stores, vec![(0, 247), (247, 247), (494, 106), (600, 0)]);

    // chunk contents line up with the original payload
    assert_eq!(&sent[2][6..], &data[247..494]);
}

#[test]
fn small_extended_send_stays_inline() {
    let bus = FakeBus::new();
    bus.queue(srsp_id(AF_DATA_REQUEST_EXT), &[STATUS_SUCCESS]);
    bus.queue(AF_DATA_CONFIRM, &[STATUS_SUCCESS, 0x01, 0x01]);

    let mut session = session(&bus);
    session
        .send_data_extended(
            Destination::Short(ShortAddress(0x00AA)),
            0x01,
            0x01,
            0x0007,
            &[0u8; 230],
        )
        .unwrap();

    let sent = bus.sent();
    assert_eq!(sent[0][0], 250); // 20 metadata bytes + 230 inline
    assert_eq!(sent.len(), 2); // request then the confirm poll
}

#[test]
fn extended_retrieve_reassembles_byte_for_byte() {
    let data: Vec<u8> = (0..600).map(|i| (i % 251) as u8).collect();
    let bus = FakeBus::new();
    for chunk in [&data[0..247], &data[247..494], &data[494..600]] {
        let mut payload = vec![STATUS_SUCCESS, chunk.len() as u8];
        payload.extend_from_slice(chunk);
        bus.queue(srsp_id(AF_DATA_RETRIEVE), &payload);
    }
    bus.queue(srsp_id(AF_DATA_RETRIEVE), &[STATUS_SUCCESS, 0]);

    let mut session = session(&bus);
    let reassembled = session.retrieve_extended_message(0x11223344, 600).unwrap();
    assert_eq!(reassembled, data);

    // requested chunk lengths mirror the store sequence, ending with
    // the zero-length retrieve that frees the module's buffer
    let requested: Vec<u8> = bus.sent().iter().map(|frame| frame[9]).collect();
    assert_eq!(requested, vec![247, 247, 106, 0]);
}

// ===== dispatch round trips =====

#[test]
fn version_decodes_the_identification_fields() {
    let bus = FakeBus::new();
    bus.queue(srsp_id(SYS_VERSION), &[0x02, 0x5E, 0x02, 0x06, 0x03]);

    let mut session = session(&bus);
    let version = session.version().unwrap();
    assert_eq!(version.transport_revision, 2);
    assert_eq!(version.product_id, 0x5E);
    assert_eq!(version.firmware, (2, 6, 3));
}

#[test]
fn start_application_sends_a_single_zero_delay_byte() {
    let bus = FakeBus::new();
    bus.queue(srsp_id(ZDO_STARTUP_FROM_APP), &[STATUS_SUCCESS]);

    let mut session = session(&bus);
    session.start_application().unwrap();
    assert_eq!(bus.sent()[0], vec![1, 0x25, 0x40, 0x00]);
}

#[test]
fn ieee_address_lookup_round_trips() {
    let bus = FakeBus::new();
    bus.queue(srsp_id(ZDO_IEEE_ADDR_REQ), &[STATUS_SUCCESS]);
    bus.queue(
        ZDO_IEEE_ADDR_RSP,
        &[
            STATUS_SUCCESS,
            8, 7, 6, 5, 4, 3, 2, 1, // IEEE address, LSB first
            0x34, 0x12, // short address
            0,    // start index
            1,    // one associated device
            0xBB, 0x00,
        ],
    );

    let mut session = session(&bus);
    let response = session
        .ieee_address(ShortAddress(0x1234), INCLUDE_ASSOCIATED_DEVICES, 0)
        .unwrap();
    assert_eq!(response.ieee_address.to_string(), "0102030405060708");
    assert_eq!(response.short_address, ShortAddress(0x1234));
    assert_eq!(response.associated, vec![ShortAddress(0x00BB)]);
}

#[test]
fn permit_join_checks_the_remote_status() {
    let bus = FakeBus::new();
    bus.queue(srsp_id(ZDO_MGMT_PERMIT_JOIN_REQ), &[STATUS_SUCCESS]);
    bus.queue(ZDO_MGMT_PERMIT_JOIN_RSP, &[0x00, 0x00, 0x85]);

    let mut session = session(&bus);
    assert_eq!(
        session.permit_join(ShortAddress::COORDINATOR, PERMIT_JOIN_INDEFINITELY),
        Err(ModuleError::Status(0x85))
    );
}

// ===== startup =====

#[test]
fn coordinator_startup_runs_the_full_sequence() {
    let bus = FakeBus::new();
    let reset_payload = [0x01, 0x02, 0x5E, 0x02, 0x06, 0x03];
    bus.queue(SYS_RESET_IND, &reset_payload);
    bus.queue(srsp_id(ZB_WRITE_CONFIGURATION), &[STATUS_SUCCESS]); // startup options
    bus.queue(SYS_RESET_IND, &reset_payload);
    bus.queue(srsp_id(SYS_VERSION), &[0x02, 0x5E, 0x02, 0x06, 0x03]);
    for _ in 0..6 {
        // device type, channel mask, pan id, callbacks, security x2
        bus.queue(srsp_id(ZB_WRITE_CONFIGURATION), &[STATUS_SUCCESS]);
    }
    bus.queue(srsp_id(AF_REGISTER), &[STATUS_SUCCESS]);
    bus.queue(srsp_id(ZDO_STARTUP_FROM_APP), &[STATUS_SUCCESS]);
    bus.queue(ZDO_STATE_CHANGE_IND, &[0x09]); // coordinator up

    let mut session = session(&bus);
    session
        .start(&ModuleConfig::coordinator(), &ApplicationConfig::default())
        .unwrap();

    // two hardware resets, and the logical type written as coordinator
    assert_eq!(bus.resets(), 2);
    let sent = bus.sent();
    let logical_type = sent
        .iter()
        .find(|frame| frame[1..3] == [0x26, 0x05] && frame[3] == ZCD_NV_LOGICAL_TYPE)
        .expect("logical type never written");
    assert_eq!(logical_type[5], 0x00);
}

#[test]
fn startup_rejects_a_product_id_mismatch() {
    let bus = FakeBus::new();
    bus.queue(SYS_RESET_IND, &[0x01, 0x02, 0x5E, 0x02, 0x06, 0x03]);
    bus.queue(srsp_id(ZB_WRITE_CONFIGURATION), &[STATUS_SUCCESS]);
    bus.queue(SYS_RESET_IND, &[0x01, 0x02, 0x5E, 0x02, 0x06, 0x03]);
    bus.queue(srsp_id(SYS_VERSION), &[0x02, 0x00, 0x02, 0x06, 0x03]);

    let mut session = session(&bus);
    assert_eq!(
        session.start(&ModuleConfig::coordinator(), &ApplicationConfig::default()),
        Err(ModuleError::InvalidModuleConfiguration)
    );
}
