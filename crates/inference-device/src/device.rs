use memory::all_ones;

use crate::config::InferenceDeviceConfig;
use crate::data_window::{DataWindow, DATA_WINDOW_SIZE};
use crate::engine::{CommandEngine, CommandOutcome, ComputeBackend, FillComputeBackend};
use crate::regs::{
    overlaps_status, ControlBits, DeviceState, RegisterFile, StatusBits, REGISTER_FILE_SIZE,
};

/// Access counters, mostly useful for tests and debugging.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeviceStats {
    pub commands_started: u64,
    pub commands_completed: u64,
    pub commands_failed: u64,
    pub stops: u64,
    pub resets: u64,
    /// BAR0 stores discarded because they touched `STATUS`.
    pub dropped_writes: u64,
    /// Accesses rejected because `offset + size` ran past the window.
    pub out_of_range_accesses: u64,
}

/// Emulated PCI inference accelerator.
///
/// The device owns its register file (BAR0), the input window (BAR1) and the output window
/// (BAR2). Every access is a plain method call; the host runtime is expected to serialize them
/// (see [`crate::InferenceBarMmio`] for the [`memory::MmioHandler`] adapters).
///
/// Accesses never fail: out-of-range reads return all ones sized to the access width, while
/// out-of-range stores and stores touching the read-only `STATUS` register are dropped.
pub struct InferenceDevice {
    config: InferenceDeviceConfig,
    regs: RegisterFile,
    input: DataWindow,
    output: DataWindow,
    engine: CommandEngine,
    stats: DeviceStats,
}

impl Default for InferenceDevice {
    fn default() -> Self {
        Self::new(InferenceDeviceConfig::default())
    }
}

impl InferenceDevice {
    pub fn new(config: InferenceDeviceConfig) -> Self {
        let backend = FillComputeBackend::from_config(&config);
        Self::with_backend(config, Box::new(backend))
    }

    pub fn with_backend(config: InferenceDeviceConfig, backend: Box<dyn ComputeBackend>) -> Self {
        Self {
            config,
            regs: RegisterFile::new(),
            input: DataWindow::new(),
            output: DataWindow::new(),
            engine: CommandEngine::new(backend),
            stats: DeviceStats::default(),
        }
    }

    pub fn config(&self) -> &InferenceDeviceConfig {
        &self.config
    }

    pub fn set_backend(&mut self, backend: Box<dyn ComputeBackend>) {
        self.engine.set_backend(backend);
    }

    pub fn regs(&self) -> &RegisterFile {
        &self.regs
    }

    pub fn input(&self) -> &DataWindow {
        &self.input
    }

    pub fn output(&self) -> &DataWindow {
        &self.output
    }

    pub fn control(&self) -> ControlBits {
        self.regs.control()
    }

    pub fn status(&self) -> StatusBits {
        self.regs.status()
    }

    pub fn state(&self) -> DeviceState {
        self.regs.status().state()
    }

    pub fn stats(&self) -> DeviceStats {
        self.stats
    }

    /// Device-level reset (e.g. PCI function reset); equivalent to a `CONTROL.RESET` store.
    pub fn reset(&mut self) {
        self.regs.clear();
        self.input.clear();
        self.output.clear();
        self.stats.resets += 1;
        tracing::debug!("inference device reset by host");
    }

    fn access_range(offset: u64, size: usize, len: usize) -> Option<usize> {
        if size == 0 || size > 8 {
            return None;
        }
        let offset = usize::try_from(offset).ok()?;
        let end = offset.checked_add(size)?;
        (end <= len).then_some(offset)
    }

    fn reject(&mut self, bar: u8, offset: u64, size: usize) {
        self.stats.out_of_range_accesses += 1;
        tracing::debug!(
            bar,
            offset = format_args!("0x{offset:x}"),
            size,
            "out-of-range access"
        );
    }

    // ---------------------------------------------------------------------------------------------
    // BAR0: register file
    // ---------------------------------------------------------------------------------------------

    pub fn bar0_read(&mut self, offset: u64, size: usize) -> u64 {
        let Some(off) = Self::access_range(offset, size, REGISTER_FILE_SIZE) else {
            self.reject(0, offset, size);
            return all_ones(size);
        };
        let value = self.regs.read(off, size).unwrap_or(all_ones(size));
        tracing::trace!(
            offset = format_args!("0x{offset:x}"),
            size,
            value = format_args!("0x{value:x}"),
            "bar0 read"
        );
        value
    }

    /// Stores into the register file, then runs the command engine if the post-write `CONTROL`
    /// value has a command bit set. The engine completes before this returns.
    pub fn bar0_write(&mut self, offset: u64, size: usize, value: u64) {
        let Some(off) = Self::access_range(offset, size, REGISTER_FILE_SIZE) else {
            self.reject(0, offset, size);
            return;
        };
        tracing::trace!(
            offset = format_args!("0x{offset:x}"),
            size,
            value = format_args!("0x{value:x}"),
            "bar0 write"
        );

        if overlaps_status(off, size) {
            self.stats.dropped_writes += 1;
            tracing::debug!(
                offset = format_args!("0x{offset:x}"),
                size,
                "dropping store that overlaps read-only STATUS"
            );
            return;
        }

        self.regs.apply_write(off, size, value);
        self.run_engine();
    }

    fn run_engine(&mut self) {
        if !self.regs.control().any() {
            return;
        }
        if self.regs.control().start && !self.regs.control().reset {
            self.stats.commands_started += 1;
        }

        let outcome = self
            .engine
            .step(&mut self.regs, &mut self.input, &mut self.output);
        match outcome {
            Some(CommandOutcome::Reset) => self.stats.resets += 1,
            Some(CommandOutcome::Completed) => self.stats.commands_completed += 1,
            Some(CommandOutcome::Failed(_)) => self.stats.commands_failed += 1,
            Some(CommandOutcome::Stopped | CommandOutcome::StopFailed(_)) => self.stats.stops += 1,
            None => {}
        }
    }

    // ---------------------------------------------------------------------------------------------
    // BAR1: input window (RW)
    // ---------------------------------------------------------------------------------------------

    pub fn bar1_read(&mut self, offset: u64, size: usize) -> u64 {
        let Some(off) = Self::access_range(offset, size, DATA_WINDOW_SIZE) else {
            self.reject(1, offset, size);
            return all_ones(size);
        };
        let value = self.input.read(off, size).unwrap_or(all_ones(size));
        tracing::trace!(
            offset = format_args!("0x{offset:x}"),
            size,
            value = format_args!("0x{value:x}"),
            "bar1 read"
        );
        value
    }

    pub fn bar1_write(&mut self, offset: u64, size: usize, value: u64) {
        let Some(off) = Self::access_range(offset, size, DATA_WINDOW_SIZE) else {
            self.reject(1, offset, size);
            return;
        };
        tracing::trace!(
            offset = format_args!("0x{offset:x}"),
            size,
            value = format_args!("0x{value:x}"),
            "bar1 write"
        );
        self.input.write(off, size, value);
    }

    // ---------------------------------------------------------------------------------------------
    // BAR2: output window (RO, no write path)
    // ---------------------------------------------------------------------------------------------

    pub fn bar2_read(&mut self, offset: u64, size: usize) -> u64 {
        let Some(off) = Self::access_range(offset, size, DATA_WINDOW_SIZE) else {
            self.reject(2, offset, size);
            return all_ones(size);
        };
        let value = self.output.read(off, size).unwrap_or(all_ones(size));
        tracing::trace!(
            offset = format_args!("0x{offset:x}"),
            size,
            value = format_args!("0x{value:x}"),
            "bar2 read"
        );
        value
    }
}
