use inference_device::regs::{CONTROL, CONTROL_W1C, CONTROL_W1S, PADDING, STATUS};
use inference_device::{
    ComputeError, DeviceState, InferenceDevice, InferenceDeviceConfig, StatusBits,
    DATA_WINDOW_SIZE, REGISTER_FILE_SIZE,
};

fn instant_device() -> InferenceDevice {
    InferenceDevice::new(InferenceDeviceConfig {
        compute_latency_ms: 0,
        ..InferenceDeviceConfig::default()
    })
}

#[test]
fn fresh_device_reads_zero_everywhere() {
    let mut dev = instant_device();
    for offset in (0..REGISTER_FILE_SIZE as u64).step_by(4) {
        assert_eq!(dev.bar0_read(offset, 4), 0, "BAR0 offset {offset:#x}");
    }
    assert_eq!(dev.bar1_read(0, 8), 0);
    assert_eq!(dev.bar2_read(4088, 8), 0);
    assert_eq!(dev.state(), DeviceState::Idle);
}

#[test]
fn writable_registers_round_trip_at_every_width() {
    let mut dev = instant_device();
    for size in [1usize, 2, 4] {
        let value = 0xA5A5_A5A5u64 & (u64::MAX >> (64 - size * 8));
        for offset in (PADDING..REGISTER_FILE_SIZE).step_by(size) {
            dev.bar0_write(offset as u64, size, value);
            assert_eq!(dev.bar0_read(offset as u64, size), value);
        }
    }

    dev.bar0_write(CONTROL_W1S as u64, 4, 0xFFFF_FFF8);
    assert_eq!(dev.bar0_read(CONTROL_W1S as u64, 4), 0xFFFF_FFF8);
}

#[test]
fn control_reserved_bits_are_stored() {
    let mut dev = instant_device();
    dev.bar0_write(CONTROL as u64, 4, 0xDEAD_BEE0);
    assert_eq!(dev.bar0_read(CONTROL as u64, 4), 0xDEAD_BEE0);
    assert_eq!(dev.state(), DeviceState::Idle);
}

#[test]
fn out_of_range_reads_return_all_ones_sized_to_the_access() {
    let mut dev = instant_device();
    assert_eq!(dev.bar0_read(64, 1), 0xFF);
    assert_eq!(dev.bar0_read(62, 4), 0xFFFF_FFFF);
    assert_eq!(dev.bar0_read(0x100, 2), 0xFFFF);
    assert_eq!(dev.bar1_read(4096, 1), 0xFF);
    assert_eq!(dev.bar1_read(4092, 8), u64::MAX);
    assert_eq!(dev.bar2_read(4095, 2), 0xFFFF);
    assert_eq!(dev.stats().out_of_range_accesses, 6);
}

#[test]
fn out_of_range_writes_change_nothing() {
    let mut dev = instant_device();
    dev.bar0_write(62, 4, 0xFFFF_FFFF);
    dev.bar0_write(64, 1, 0x01);
    dev.bar1_write(4093, 4, 0xFFFF_FFFF);

    assert!(dev.regs().as_bytes().iter().all(|&b| b == 0));
    assert!(dev.input().is_zeroed());
}

#[test]
fn last_in_range_bytes_are_reachable() {
    let mut dev = instant_device();
    dev.bar0_write(63, 1, 0x7E);
    assert_eq!(dev.bar0_read(60, 4), 0x7E00_0000);

    dev.bar1_write(4088, 8, 0x1122_3344_5566_7788);
    assert_eq!(dev.bar1_read(4095, 1), 0x11);
}

#[test]
fn status_is_never_written_through_bar0() {
    let mut dev = instant_device();
    for (offset, size) in [(STATUS, 4usize), (STATUS, 1), (STATUS + 2, 2), (STATUS - 2, 4)] {
        dev.bar0_write(offset as u64, size, u64::MAX);
        assert_eq!(dev.bar0_read(STATUS as u64, 4), 0);
    }
    // The store straddling W1C/STATUS is dropped, so W1C keeps its old value.
    assert_eq!(dev.bar0_read(CONTROL_W1C as u64, 4), 0);
    assert_eq!(dev.stats().dropped_writes, 4);
}

#[test]
fn stores_adjacent_to_status_still_land() {
    let mut dev = instant_device();
    dev.bar0_write(STATUS as u64 - 1, 1, 0x5A);
    dev.bar0_write(PADDING as u64, 1, 0xA5);
    assert_eq!(dev.bar0_read(CONTROL_W1C as u64, 4), 0x5A00_0000);
    assert_eq!(dev.bar0_read(PADDING as u64, 1), 0xA5);
    assert_eq!(dev.stats().dropped_writes, 0);
}

#[test]
fn start_fills_output_clears_input_and_reports_done() {
    let mut dev = instant_device();
    dev.bar1_write(0, 4, 0xDEAD_BEEF);
    dev.bar0_write(CONTROL as u64, 4, 0x1);

    assert_eq!(
        dev.status(),
        StatusBits {
            busy: false,
            done: true,
            error: 0
        }
    );
    assert_eq!(dev.bar0_read(STATUS as u64, 4), 0x2);
    assert_eq!(dev.bar0_read(CONTROL as u64, 4), 0);
    assert!(dev.input().is_zeroed());
    assert!(dev.output().as_bytes().iter().all(|&b| b == 0x01));
}

#[test]
fn start_clears_a_pending_stop_bit() {
    let mut dev = instant_device();
    dev.bar0_write(CONTROL as u64, 4, 0x3);
    assert_eq!(dev.bar0_read(CONTROL as u64, 4), 0);
    assert_eq!(dev.state(), DeviceState::Done);
    assert_eq!(dev.stats().stops, 0);
}

#[test]
fn stop_from_any_state_returns_to_idle() {
    let mut dev = instant_device();
    dev.bar0_write(CONTROL as u64, 4, 0x2);
    assert_eq!(dev.bar0_read(STATUS as u64, 4), 0);
    assert_eq!(dev.bar0_read(CONTROL as u64, 4), 0);

    dev.bar0_write(CONTROL as u64, 4, 0x1);
    dev.bar0_write(CONTROL as u64, 4, 0x2);
    assert_eq!(dev.state(), DeviceState::Idle);
    assert_eq!(dev.bar0_read(CONTROL as u64, 4), 0);
    // Stop does not touch the data windows.
    assert!(dev.output().as_bytes().iter().all(|&b| b == 0x01));
}

#[test]
fn reset_wins_over_every_other_command() {
    let mut dev = instant_device();
    dev.bar0_write(PADDING as u64, 4, 0xFFFF_FFFF);
    dev.bar1_write(0, 8, u64::MAX);
    dev.bar0_write(CONTROL as u64, 4, 0x1);
    dev.bar1_write(8, 8, u64::MAX);

    dev.bar0_write(CONTROL as u64, 4, 0x7);

    assert!(dev.regs().as_bytes().iter().all(|&b| b == 0));
    assert!(dev.input().is_zeroed());
    assert!(dev.output().is_zeroed());
    assert_eq!(dev.stats().commands_started, 1);
}

#[test]
fn failed_start_keeps_busy_and_reports_an_error_code() {
    let mut dev = instant_device();
    dev.set_backend(Box::new(
        |_: &[u8], _: &mut [u8]| -> Result<(), ComputeError> { Err(ComputeError::Code(7)) },
    ));
    dev.bar1_write(0, 4, 0xDEAD_BEEF);
    dev.bar0_write(CONTROL as u64, 4, 0x1);

    let status = dev.status();
    assert!(status.busy);
    assert!(!status.done);
    assert_eq!(status.error, 7);
    assert_eq!(dev.bar0_read(CONTROL as u64, 4), 0);
    assert_eq!(dev.bar1_read(0, 4), 0xDEAD_BEEF);
    assert!(dev.output().is_zeroed());

    dev.bar0_write(CONTROL as u64, 4, 0x4);
    assert_eq!(dev.state(), DeviceState::Idle);
    assert_eq!(dev.status().error, 0);
}

#[test]
fn every_input_window_offset_round_trips() {
    let mut dev = instant_device();
    for offset in 0..DATA_WINDOW_SIZE as u64 {
        let pattern = (offset as u8) ^ 0xA5;
        dev.bar1_write(offset, 1, u64::from(pattern));
        assert_eq!(dev.bar1_read(offset, 1), u64::from(pattern), "BAR1 offset {offset:#x}");
    }
    for offset in 0..DATA_WINDOW_SIZE as u64 {
        assert_eq!(dev.bar1_read(offset, 1), u64::from((offset as u8) ^ 0xA5));
    }
    assert_eq!(dev.stats().out_of_range_accesses, 0);
}
