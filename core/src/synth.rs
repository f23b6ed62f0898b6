use crate::{MouthConfig, MouthError, Result};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, info, warn};

/// Anything that can turn text into a WAV container on disk.
pub trait Synthesizer {
    fn synthesize(&self, text: &str, output: &Path) -> Result<()>;
}

impl<S: Synthesizer + ?Sized> Synthesizer for &S {
    fn synthesize(&self, text: &str, output: &Path) -> Result<()> {
        (**self).synthesize(text, output)
    }
}

/// Voice model and its JSON config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelPair {
    pub model: PathBuf,
    pub config: PathBuf,
}

/// Find a `.onnx` model and its config in `dir`.
///
/// `voice.onnx` pairs with `voice.onnx.json`, or failing that `voice.json`.
/// Without any such pair, the first model and first config (by name) are
/// used together.
pub fn discover_model(dir: impl AsRef<Path>) -> Result<ModelPair> {
    let dir = dir.as_ref();
    let not_found = |reason: &str| MouthError::ModelNotFound {
        dir: dir.to_path_buf(),
        reason: reason.into(),
    };

    let mut onnx_files = Vec::new();
    let mut json_files = Vec::new();

    for entry in fs::read_dir(dir)? {
        let path = entry?.path();

        if !path.is_file() {
            continue;
        }

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("onnx") => onnx_files.push(path),
            Some("json") => json_files.push(path),
            _ => {}
        }
    }

    onnx_files.sort();
    json_files.sort();

    let first_onnx = onnx_files
        .first()
        .ok_or_else(|| not_found("no .onnx model file"))?;
    let first_json = json_files
        .first()
        .ok_or_else(|| not_found("no .json config file"))?;

    for onnx in &onnx_files {
        let mut paired = onnx.clone().into_os_string();
        paired.push(".json");
        let paired = PathBuf::from(paired);
        let sibling = onnx.with_extension("json");

        for candidate in [paired, sibling] {
            if json_files.contains(&candidate) {
                info!(
                    model = %onnx.display(),
                    config = %candidate.display(),
                    "Using voice model"
                );

                return Ok(ModelPair {
                    model: onnx.clone(),
                    config: candidate,
                });
            }
        }
    }

    warn!(
        model = %first_onnx.display(),
        config = %first_json.display(),
        "No matching model/config pair, using first available files"
    );

    Ok(ModelPair {
        model: first_onnx.clone(),
        config: first_json.clone(),
    })
}

/// The piper command-line synthesizer.
#[derive(Debug, Clone)]
pub struct PiperEngine {
    binary: PathBuf,
    voice: ModelPair,
}

impl PiperEngine {
    pub fn new(binary: impl Into<PathBuf>, voice: ModelPair) -> Result<Self> {
        let binary = binary.into();
        check_executable(&binary)?;

        Ok(PiperEngine { binary, voice })
    }

    /// Engine for `config`, discovering the voice model when none is set.
    pub fn from_config(config: &MouthConfig) -> Result<Self> {
        let voice = match (&config.model, &config.model_config) {
            (Some(model), Some(model_config)) => ModelPair {
                model: model.clone(),
                config: model_config.clone(),
            },
            (Some(model), None) => {
                let mut paired = model.clone().into_os_string();
                paired.push(".json");

                ModelPair {
                    model: model.clone(),
                    config: PathBuf::from(paired),
                }
            }
            (None, _) => discover_model(&config.model_dir)?,
        };

        Self::new(&config.piper_binary, voice)
    }

    pub fn voice(&self) -> &ModelPair {
        &self.voice
    }
}

impl Synthesizer for PiperEngine {
    fn synthesize(&self, text: &str, output: &Path) -> Result<()> {
        let mut command = Command::new(&self.binary);
        command
            .arg("--model")
            .arg(&self.voice.model)
            .arg("--config")
            .arg(&self.voice.config)
            .arg("--output_file")
            .arg(output)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        debug!(?command, "Running synthesis engine");

        let mut child = command.spawn().map_err(|e| {
            MouthError::Synthesis(format!(
                "Could not start {}: {}",
                self.binary.display(),
                e
            ))
        })?;

        // Closing stdin on drop tells the engine the text is complete
        if let Some(mut stdin) = child.stdin.take() {
            match stdin.write_all(text.as_bytes()) {
                Ok(()) => {}
                // Engine quit before reading; its exit status and stderr
                // explain why
                Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                    debug!("Engine closed its input early");
                }
                Err(e) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(e.into());
                }
            }
        }

        let result = child.wait_with_output()?;

        if !result.stdout.is_empty() {
            debug!(
                stdout = %String::from_utf8_lossy(&result.stdout).trim(),
                "Engine output"
            );
        }

        if !result.status.success() {
            return Err(MouthError::Synthesis(format!(
                "{} exited with {}: {}",
                self.binary.display(),
                result.status,
                String::from_utf8_lossy(&result.stderr).trim()
            )));
        }

        info!(path = %output.display(), "Speech synthesized");
        Ok(())
    }
}

fn check_executable(binary: &Path) -> Result<()> {
    let metadata = fs::metadata(binary).map_err(|e| {
        MouthError::Config(format!(
            "Synthesis binary {}: {}",
            binary.display(),
            e
        ))
    })?;

    if !metadata.is_file() {
        return Err(MouthError::Config(format!(
            "Synthesis binary {} is not a file",
            binary.display()
        )));
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        if metadata.permissions().mode() & 0o111 == 0 {
            return Err(MouthError::Config(format!(
                "Synthesis binary {} is not executable",
                binary.display()
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, b"").unwrap();
        path
    }

    #[test]
    fn test_discover_prefers_onnx_json_pair() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a.json");
        let model = touch(dir.path(), "voice.onnx");
        let config = touch(dir.path(), "voice.onnx.json");

        let pair = discover_model(dir.path()).unwrap();
        assert_eq!(pair, ModelPair { model, config });
    }

    #[test]
    fn test_discover_accepts_base_name_json() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a.json");
        let model = touch(dir.path(), "voice.onnx");
        let config = touch(dir.path(), "voice.json");

        let pair = discover_model(dir.path()).unwrap();
        assert_eq!(pair, ModelPair { model, config });
    }

    #[test]
    fn test_discover_falls_back_to_first_files() {
        let dir = tempfile::tempdir().unwrap();
        let config = touch(dir.path(), "alpha.json");
        touch(dir.path(), "beta.json");
        let model = touch(dir.path(), "voice.onnx");

        let pair = discover_model(dir.path()).unwrap();
        assert_eq!(pair, ModelPair { model, config });
    }

    #[test]
    fn test_discover_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "voice.onnx");

        let err = discover_model(dir.path()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ModelNotFound);
    }

    #[test]
    fn test_missing_binary_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let voice = ModelPair {
            model: dir.path().join("v.onnx"),
            config: dir.path().join("v.onnx.json"),
        };

        let err = PiperEngine::new(dir.path().join("piper"), voice).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[cfg(unix)]
    mod unix {
        use super::*;
        use std::os::unix::fs::PermissionsExt;

        fn script(dir: &Path, body: &str) -> PathBuf {
            let path = dir.join("piper");
            fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755))
                .unwrap();
            path
        }

        fn voice(dir: &Path) -> ModelPair {
            ModelPair {
                model: dir.join("v.onnx"),
                config: dir.join("v.onnx.json"),
            }
        }

        #[test]
        fn test_text_goes_to_stdin_and_args_are_passed() {
            let dir = tempfile::tempdir().unwrap();
            let binary = script(
                dir.path(),
                r#"echo "$@" > "$(dirname "$0")/args.txt"
while [ $# -gt 0 ]; do
  if [ "$1" = "--output_file" ]; then out="$2"; fi
  shift
done
cat > "$out""#,
            );

            let engine = PiperEngine::new(binary, voice(dir.path())).unwrap();
            let output = dir.path().join("out.wav");
            engine.synthesize("hello there", &output).unwrap();

            assert_eq!(fs::read_to_string(&output).unwrap(), "hello there");

            let args = fs::read_to_string(dir.path().join("args.txt")).unwrap();
            assert!(args.contains("--model"));
            assert!(args.contains("v.onnx.json"));
            assert!(args.contains("--output_file"));
        }

        #[test]
        fn test_nonzero_exit_reports_stderr() {
            let dir = tempfile::tempdir().unwrap();
            let binary = script(dir.path(), "cat > /dev/null\necho boom >&2\nexit 3");

            let engine = PiperEngine::new(binary, voice(dir.path())).unwrap();
            let err = engine
                .synthesize("hi", &dir.path().join("out.wav"))
                .unwrap_err();

            assert_eq!(err.kind(), ErrorKind::Synthesis);
            assert!(err.to_string().contains("boom"));
        }

        #[test]
        fn test_early_exit_reports_stderr() {
            let dir = tempfile::tempdir().unwrap();
            let binary =
                script(dir.path(), "echo \"bad model\" >&2\nexit 1");

            let engine = PiperEngine::new(binary, voice(dir.path())).unwrap();
            // More than a pipe buffer, so the write outlives the engine
            let text = "word ".repeat(1 << 18);
            let err = engine
                .synthesize(&text, &dir.path().join("out.wav"))
                .unwrap_err();

            assert_eq!(err.kind(), ErrorKind::Synthesis);
            assert!(err.to_string().contains("bad model"));
        }

        #[test]
        fn test_non_executable_binary() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("piper");
            fs::write(&path, "#!/bin/sh\n").unwrap();
            fs::set_permissions(&path, fs::Permissions::from_mode(0o644))
                .unwrap();

            let err = PiperEngine::new(path, voice(dir.path())).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Config);
        }
    }
}
