//! Single report command

use crate::cli::args::ReportArgs;
use crate::config::MetricsConfig;
use crate::report::{ReportBuilder, write_json};
use anyhow::{Context, Result};
use tracing::debug;

pub fn run_report(config: &MetricsConfig, args: &ReportArgs) -> Result<()> {
    debug!("Report arguments: {:?}", args);

    let builder = ReportBuilder::new(&config.layout(), config);

    let envelope = match builder.run(args.kind, args.month.as_deref()) {
        Ok(envelope) => envelope,
        Err(error) => {
            let body = serde_json::to_string_pretty(&error)
                .context("Failed to serialize error envelope")?;
            eprintln!("{}", body);
            anyhow::bail!("{} report failed with status {}", args.kind, error.status);
        }
    };

    match &args.output {
        Some(path) => {
            write_json(path, &envelope, args.pretty)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            debug!("Wrote {} report to {}", args.kind, path.display());
        }
        None => {
            let body = if args.pretty {
                serde_json::to_string_pretty(&envelope)?
            } else {
                serde_json::to_string(&envelope)?
            };
            println!("{}", body);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::month::DataSubset;
    use crate::report::ReportKind;
    use std::fs;
    use tempfile::TempDir;

    fn report_args(kind: ReportKind, output: Option<std::path::PathBuf>) -> ReportArgs {
        ReportArgs {
            kind,
            month: Some("2025-09".to_string()),
            output,
            pretty: false,
        }
    }

    #[test]
    fn test_report_written_to_output() {
        let temp_dir = TempDir::new().unwrap();
        let config = MetricsConfig::default().with_data_root(temp_dir.path());
        let dir = config
            .layout()
            .month_dir(DataSubset::Raw, &"2025-09".parse().unwrap());
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join(crate::schema::Dataset::News.file_name()),
            "키워드,그룹,총 발행량\n쿨페이즈,고주파,4\n덴서티,고주파,6\n",
        )
        .unwrap();

        let output = temp_dir.path().join("news.json");
        run_report(&config, &report_args(ReportKind::News, Some(output.clone()))).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(output).unwrap()).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["kind"], "news");
    }

    #[test]
    fn test_missing_export_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let config = MetricsConfig::default().with_data_root(temp_dir.path());
        fs::create_dir_all(
            config
                .layout()
                .month_dir(DataSubset::Raw, &"2025-09".parse().unwrap()),
        )
        .unwrap();

        let error = run_report(&config, &report_args(ReportKind::Sales, None)).unwrap_err();
        assert!(error.to_string().contains("status 404"), "{}", error);
    }
}
