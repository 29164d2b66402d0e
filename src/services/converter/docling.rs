use super::{ConvertedDocument, ConverterError, ConverterInitError, DocumentConverter};
use std::path::Path;
use std::process::Command;

/// Engine backed by the `docling` command-line tool.
///
/// Install with:
/// ```bash
/// pip install docling
/// ```
/// Output is written into a temporary directory beside the input that is
/// removed when the conversion returns.
pub struct DoclingCliConverter {
    command: String,
    version: String,
}

impl DoclingCliConverter {
    /// Verify the command runs before accepting it as the engine
    pub fn locate(command: &str) -> Result<Self, ConverterInitError> {
        let output = Command::new(command)
            .arg("--version")
            .output()
            .map_err(|e| {
                ConverterInitError::Unavailable(format!("failed to run '{}': {}", command, e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ConverterInitError::Unavailable(format!(
                "'{} --version' exited with {}: {}",
                command,
                output.status,
                stderr.trim()
            )));
        }

        let version = String::from_utf8_lossy(&output.stdout)
            .lines()
            .next()
            .unwrap_or_default()
            .trim()
            .to_string();
        tracing::info!("Using docling CLI '{}' ({})", command, version);

        Ok(Self {
            command: command.to_string(),
            version,
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }
}

#[async_trait::async_trait]
impl DocumentConverter for DoclingCliConverter {
    fn name(&self) -> &str {
        "docling"
    }

    fn convert(&self, path: &Path) -> Result<ConvertedDocument, ConverterError> {
        let file_name = path
            .file_name()
            .ok_or_else(|| ConverterError::Engine("staged file has no name".to_string()))?;
        // Named after the input so the staging sweeper treats it as part of it
        let output_dir = tempfile::Builder::new()
            .prefix(&format!("{}.docling-", file_name.to_string_lossy()))
            .tempdir_in(path.parent().unwrap_or_else(|| Path::new(".")))?;

        let output = Command::new(&self.command)
            .arg(path)
            .arg("--to")
            .arg("md")
            .arg("--output")
            .arg(output_dir.path())
            .output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = stderr.trim();
            return Err(ConverterError::Engine(if message.is_empty() {
                format!("docling exited with {}", output.status)
            } else {
                message.to_string()
            }));
        }

        let stem = path
            .file_stem()
            .ok_or_else(|| ConverterError::Engine("staged file has no name".to_string()))?;
        let markdown_path = output_dir
            .path()
            .join(format!("{}.md", stem.to_string_lossy()));

        let markdown = std::fs::read_to_string(&markdown_path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConverterError::Engine("docling produced no markdown output".to_string())
            } else {
                ConverterError::Io(e)
            }
        })?;

        Ok(ConvertedDocument::from_markdown("docling", markdown))
    }

    async fn health_check(&self) -> bool {
        tokio::process::Command::new(&self.command)
            .arg("--version")
            .output()
            .await
            .map(|o| o.status.success())
            .unwrap_or(false)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::io::Write;
    use std::os::unix::fs::PermissionsExt;

    /// Write an executable shell script standing in for the docling CLI
    fn fake_cli(dir: &Path, body: &str) -> String {
        let path = dir.join("fake-docling");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "#!/bin/sh\n{}", body).unwrap();
        drop(file);
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().to_string()
    }

    const WRITES_MARKDOWN: &str = r#"
if [ "$1" = "--version" ]; then echo "Docling version: 2.0.0"; exit 0; fi
name=$(basename "$1")
printf '# Converted\n\nfrom %s\n' "$name" > "$5/${name%.*}.md"
"#;

    #[test]
    fn test_locate_reads_version() {
        let dir = tempfile::tempdir().unwrap();
        let cli = fake_cli(dir.path(), WRITES_MARKDOWN);
        let converter = DoclingCliConverter::locate(&cli).unwrap();
        assert_eq!(converter.version(), "Docling version: 2.0.0");
    }

    #[test]
    fn test_locate_failure_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let cli = fake_cli(dir.path(), "echo broken >&2; exit 3");
        let err = DoclingCliConverter::locate(&cli).err().unwrap();
        assert!(err.to_string().contains("broken"));
    }

    #[test]
    fn test_convert_reads_generated_markdown() {
        let dir = tempfile::tempdir().unwrap();
        let cli = fake_cli(dir.path(), WRITES_MARKDOWN);
        let converter = DoclingCliConverter::locate(&cli).unwrap();

        let input = dir.path().join("report.pdf");
        std::fs::write(&input, b"%PDF-1.4").unwrap();

        let doc = converter.convert(&input).unwrap();
        assert_eq!(
            doc.export_markdown().unwrap(),
            "# Converted\n\nfrom report.pdf\n"
        );
    }

    #[test]
    fn test_convert_failure_carries_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let cli = fake_cli(
            dir.path(),
            r#"if [ "$1" = "--version" ]; then exit 0; fi
echo "Input document is not valid" >&2; exit 1"#,
        );
        let converter = DoclingCliConverter::locate(&cli).unwrap();

        let input = dir.path().join("broken.docx");
        std::fs::write(&input, b"junk").unwrap();

        let err = converter.convert(&input).unwrap_err();
        assert_eq!(err.to_string(), "Input document is not valid");
    }

    #[test]
    fn test_output_dir_sits_beside_input_and_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let tool = tempfile::tempdir().unwrap();
        let cli = fake_cli(
            tool.path(),
            &format!(
                "{}\nls -d \"$5\" > \"{}/seen\"",
                WRITES_MARKDOWN.trim_end(),
                tool.path().display()
            ),
        );
        let converter = DoclingCliConverter::locate(&cli).unwrap();

        let input = dir.path().join("md-upload-x1.pdf");
        std::fs::write(&input, b"%PDF-1.4").unwrap();
        converter.convert(&input).unwrap();

        let seen = std::fs::read_to_string(tool.path().join("seen")).unwrap();
        let seen = Path::new(seen.trim());
        assert_eq!(seen.parent().unwrap(), dir.path());
        assert!(
            seen.file_name()
                .unwrap()
                .to_string_lossy()
                .starts_with("md-upload-x1.pdf.docling-")
        );
        assert!(!seen.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
