// GPU utilization via nvidia-smi, independent of the host OS

use tracing::instrument;

use super::command::{CommandRunner, display};
use crate::error::CollectError;
use crate::models::RawSample;

const NVIDIA_SMI: &str = "nvidia-smi";
const NVIDIA_SMI_ARGS: [&str; 2] = [
    "--format=csv,noheader,nounits",
    "--query-gpu=utilization.gpu",
];
const NO_DEVICES: &str = "No devices were found";

#[instrument(skip(runner), fields(repo = "probe", operation = "collect_gpu"))]
pub(crate) async fn collect(runner: &impl CommandRunner) -> Result<RawSample, CollectError> {
    let out = runner.run(NVIDIA_SMI, &NVIDIA_SMI_ARGS).await?;
    if !out.success {
        // nvidia-smi exits non-zero when it finds no device
        let output = out.combined();
        if output.contains(NO_DEVICES) {
            return Ok(RawSample::Gpu { load_percent: 0.0 });
        }
        return Err(CollectError::Status {
            command: display(NVIDIA_SMI, &NVIDIA_SMI_ARGS),
            status: out.status,
            output,
        });
    }
    // warnings on stderr do not affect the reading
    Ok(RawSample::Gpu {
        load_percent: parse_nvidia_smi(&out.stdout)?,
    })
}

/// One utilization percentage per line; averaged and rounded half-up to 1 decimal.
pub(crate) fn parse_nvidia_smi(content: &str) -> Result<f64, CollectError> {
    if content.contains(NO_DEVICES) {
        return Ok(0.0);
    }
    let values = content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(|l| {
            l.parse::<f64>()
                .map_err(|e| CollectError::parse(NVIDIA_SMI, format!("'{}': {}", l, e)))
        })
        .collect::<Result<Vec<_>, _>>()?;
    if values.is_empty() {
        return Ok(0.0);
    }
    let sum: f64 = values.iter().sum();
    Ok((sum * 10.0 / values.len() as f64).round() / 10.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe_repo::command::CommandOutput;

    struct FixedRunner(CommandOutput);

    impl CommandRunner for FixedRunner {
        async fn run(&self, _: &str, _: &[&str]) -> Result<CommandOutput, CollectError> {
            Ok(self.0.clone())
        }
    }

    fn output(success: bool, stdout: &str, stderr: &str) -> FixedRunner {
        FixedRunner(CommandOutput {
            success,
            status: (if success { "exit status: 0" } else { "exit status: 6" }).into(),
            stdout: stdout.into(),
            stderr: stderr.into(),
        })
    }

    #[tokio::test]
    async fn stderr_warning_does_not_break_a_successful_reading() {
        let runner = output(true, "40\n60\n", "WARNING: infoROM is corrupted at gpu 0000:01:00.0\n");
        assert_eq!(
            collect(&runner).await.unwrap(),
            RawSample::Gpu { load_percent: 50.0 }
        );
    }

    #[tokio::test]
    async fn failing_status_without_devices_reads_zero() {
        let runner = output(false, "No devices were found\n", "");
        assert_eq!(
            collect(&runner).await.unwrap(),
            RawSample::Gpu { load_percent: 0.0 }
        );
        let runner = output(false, "", "NVIDIA-SMI has failed because it couldn't communicate\n");
        assert!(matches!(
            collect(&runner).await.unwrap_err(),
            CollectError::Status { .. }
        ));
    }

    #[test]
    fn averages_across_devices() {
        assert_eq!(parse_nvidia_smi("0\n0\n").unwrap(), 0.0);
        assert_eq!(parse_nvidia_smi("10\n15\n").unwrap(), 12.5);
        assert_eq!(parse_nvidia_smi("1\n0\n0\n").unwrap(), 0.3);
        // 2/3 = 0.666.. -> 0.7
        assert_eq!(parse_nvidia_smi("2\n0\n0\n").unwrap(), 0.7);
    }

    #[test]
    fn no_device_yields_zero() {
        assert_eq!(parse_nvidia_smi("").unwrap(), 0.0);
        assert_eq!(parse_nvidia_smi("\n \n").unwrap(), 0.0);
        assert_eq!(parse_nvidia_smi("No devices were found\n").unwrap(), 0.0);
    }

    #[test]
    fn garbage_is_a_parse_error() {
        let err = parse_nvidia_smi("NVIDIA-SMI has failed\n").unwrap_err();
        assert!(matches!(err, CollectError::Parse { .. }));
    }
}
