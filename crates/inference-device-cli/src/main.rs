#![forbid(unsafe_code)]

// Native-only tool; keep a stub `main` so wasm workspace builds still link.
#[cfg(target_arch = "wasm32")]
fn main() {}

#[cfg(not(target_arch = "wasm32"))]
mod native {
    use std::cell::RefCell;
    use std::path::PathBuf;
    use std::rc::Rc;
    use std::time::Duration;

    use anyhow::{anyhow, bail, Context, Result};
    use clap::Parser;
    use inference_device::regs::{CONTROL, STATUS};
    use inference_device::{
        InferenceBars, InferenceDevice, InferenceDeviceConfig, InferenceDriver, MmioBusRegistrar,
        StatusBits, DATA_WINDOW_SIZE, INFERENCE_DEVICE_NAME, INFERENCE_PCI_DEVICE_ID, INFERENCE_PCI_VENDOR_ID,
    };
    use memory::MmioBus;

    const BARS: InferenceBars = InferenceBars {
        registers: 0xFEB0_0000,
        input: 0xFEB0_1000,
        output: 0xFEB0_2000,
    };

    #[derive(Debug, Parser)]
    #[command(about = "Runs one command through the emulated PCI inference device")]
    pub struct Args {
        /// Input bytes: hex digits (`deadbeef`, `0xde ad be ef`) or `@path` to read a raw file.
        #[arg(long, default_value = "")]
        input: String,

        /// JSON device config (`{"compute_latency_ms": 10, "output_fill": 1}`).
        #[arg(long)]
        config: Option<PathBuf>,

        /// Override the byte written by the compute stub.
        #[arg(long)]
        fill: Option<u8>,

        /// Override the compute stub latency in milliseconds.
        #[arg(long)]
        latency_ms: Option<u64>,

        /// How long to poll STATUS.DONE before giving up.
        #[arg(long, default_value_t = 1000)]
        timeout_ms: u64,

        /// Number of output bytes to print.
        #[arg(long, default_value_t = 16)]
        dump_bytes: usize,

        /// Write CONTROL.RESET before staging input.
        #[arg(long)]
        reset_first: bool,
    }

    fn parse_hex(text: &str) -> Result<Vec<u8>> {
        let digits: String = text
            .split_whitespace()
            .map(|word| word.strip_prefix("0x").unwrap_or(word))
            .collect::<Vec<_>>()
            .concat();
        if !digits.is_ascii() {
            bail!("hex input contains non-ASCII characters");
        }
        if digits.len() % 2 != 0 {
            bail!("hex input has an odd number of digits ({})", digits.len());
        }
        (0..digits.len())
            .step_by(2)
            .map(|i| {
                u8::from_str_radix(&digits[i..i + 2], 16)
                    .with_context(|| format!("invalid hex byte {:?}", &digits[i..i + 2]))
            })
            .collect()
    }

    fn load_input(arg: &str) -> Result<Vec<u8>> {
        match arg.strip_prefix('@') {
            Some(path) => {
                std::fs::read(path).with_context(|| format!("failed to read input file {path}"))
            }
            None => parse_hex(arg),
        }
    }

    fn load_config(args: &Args) -> Result<InferenceDeviceConfig> {
        let mut config = match &args.config {
            Some(path) => {
                let json = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read config: {}", path.display()))?;
                InferenceDeviceConfig::from_json_str(&json)
                    .with_context(|| format!("invalid config: {}", path.display()))?
            }
            None => InferenceDeviceConfig::default(),
        };
        if let Some(fill) = args.fill {
            config.output_fill = fill;
        }
        if let Some(latency_ms) = args.latency_ms {
            config.compute_latency_ms = latency_ms;
        }
        config.validate()?;
        Ok(config)
    }

    fn hex_dump(bytes: &[u8]) -> String {
        bytes
            .chunks(16)
            .enumerate()
            .map(|(row, chunk)| {
                let hex: Vec<String> = chunk.iter().map(|b| format!("{b:02x}")).collect();
                format!("{:04x}: {}", row * 16, hex.join(" "))
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// What the driver observed over MMIO after one command.
    struct RunReport {
        status: StatusBits,
        control_raw: u32,
        status_raw: u32,
        output: Vec<u8>,
    }

    fn run_command(args: &Args) -> Result<RunReport> {
        let config = load_config(args)?;
        let input = load_input(&args.input)?;
        if args.dump_bytes > DATA_WINDOW_SIZE {
            bail!(
                "--dump-bytes {} exceeds the {DATA_WINDOW_SIZE}-byte output window",
                args.dump_bytes
            );
        }

        tracing::info!(
            name = INFERENCE_DEVICE_NAME,
            vendor = format_args!("{INFERENCE_PCI_VENDOR_ID:04x}"),
            device = format_args!("{INFERENCE_PCI_DEVICE_ID:04x}"),
            ?config,
            "instantiating device"
        );
        let dev = Rc::new(RefCell::new(InferenceDevice::new(config)));
        let mut bus = MmioBus::new();
        let mut registrar = MmioBusRegistrar::new(&mut bus)
            .with_base(0, BARS.registers)
            .with_base(1, BARS.input)
            .with_base(2, BARS.output);
        InferenceDevice::register_windows(&dev, &mut registrar)
            .context("failed to map device windows")?;

        let mut driver = InferenceDriver::new(&mut bus, BARS);
        if args.reset_first {
            driver.reset();
        }
        let mut output = driver
            .run(&input, Duration::from_millis(args.timeout_ms))
            .map_err(|e| anyhow!("inference command failed: {e}"))?;
        output.truncate(args.dump_bytes);
        let status = driver.status();

        let stats = dev.borrow().stats();
        tracing::debug!(?stats, "device counters");

        Ok(RunReport {
            status,
            control_raw: bus.read_u32(BARS.registers + CONTROL as u64),
            status_raw: bus.read_u32(BARS.registers + STATUS as u64),
            output,
        })
    }

    pub fn main() -> Result<()> {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .init();

        let args = Args::parse();
        let report = run_command(&args)?;

        println!(
            "status: busy={} done={} error={}",
            u8::from(report.status.busy),
            u8::from(report.status.done),
            report.status.error
        );
        println!(
            "control: 0x{:08x}  status: 0x{:08x}",
            report.control_raw, report.status_raw
        );
        if !report.output.is_empty() {
            println!("output:\n{}", hex_dump(&report.output));
        }
        Ok(())
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn hex_input_accepts_prefixes_and_spaces() {
            assert_eq!(parse_hex("deadbeef").unwrap(), vec![0xDE, 0xAD, 0xBE, 0xEF]);
            assert_eq!(parse_hex("0xde ad 0xBE ef").unwrap(), vec![0xDE, 0xAD, 0xBE, 0xEF]);
            assert!(parse_hex("").unwrap().is_empty());
        }

        #[test]
        fn hex_input_rejects_malformed_text() {
            assert!(parse_hex("abc").is_err());
            assert!(parse_hex("zz").is_err());
        }

        #[test]
        fn hex_dump_prefixes_rows_with_offsets() {
            let bytes: Vec<u8> = (0..18).collect();
            assert_eq!(
                hex_dump(&bytes),
                "0000: 00 01 02 03 04 05 06 07 08 09 0a 0b 0c 0d 0e 0f\n0010: 10 11"
            );
        }

        #[test]
        fn dump_is_read_back_through_the_output_window() {
            let args = Args::parse_from([
                "inference-device",
                "--input",
                "deadbeef",
                "--fill",
                "90",
                "--latency-ms",
                "0",
                "--dump-bytes",
                "8",
            ]);
            let report = run_command(&args).unwrap();
            assert_eq!(report.output, vec![0x5A; 8]);
            assert!(report.status.done);
            assert_eq!(report.status_raw, 0x2);
            assert_eq!(report.control_raw, 0);
        }

        #[test]
        fn dump_bytes_past_the_window_are_rejected() {
            let args = Args::parse_from([
                "inference-device",
                "--latency-ms",
                "0",
                "--dump-bytes",
                "4097",
            ]);
            assert!(run_command(&args).is_err());
        }

        #[test]
        fn flags_override_the_config_file() {
            let args = Args::parse_from([
                "inference-device",
                "--fill",
                "7",
                "--latency-ms",
                "0",
            ]);
            let config = load_config(&args).unwrap();
            assert_eq!(config.output_fill, 7);
            assert_eq!(config.compute_latency_ms, 0);
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn main() -> anyhow::Result<()> {
    native::main()
}
