//! Platform adapter backed by the device's shell tools.
//!
//! Covers what the stock command-line utilities can do: screenshots via
//! `screencap`, app launch via `cmd package` + `am start`, and input via
//! `input`. There is no command-line route to a hardware encoder bound to
//! a virtual display, so display creation reports failure through this
//! adapter and `ensure_display` returns `-1`.

use std::path::PathBuf;
use std::process::{Command, Output};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, warn};

use vdisp_core::display::platform::{RenderSurface, VirtualDisplay};
use vdisp_core::display::types::{EncoderConfig, VirtualDisplayRequest};
use vdisp_core::protocol::input::{InputEvent, key_action, motion_action};
use vdisp_core::{DisplayId, DisplayPlatform, InputBackend, VdispError, VideoEncoder};

/// Scratch directory for screenshot files.
const SCRATCH_DIR: &str = "/data/local/tmp";

fn run(program: &str, args: &[&str]) -> Result<Output, VdispError> {
    debug!("exec {program} {}", args.join(" "));
    Ok(Command::new(program).args(args).output()?)
}

// ── ShellPlatform ────────────────────────────────────────────────

pub struct ShellPlatform {
    api_level: u32,
    scratch_dir: PathBuf,
    screenshots: AtomicU64,
}

impl Default for ShellPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl ShellPlatform {
    pub fn new() -> Self {
        Self {
            api_level: read_api_level().unwrap_or(0),
            scratch_dir: PathBuf::from(SCRATCH_DIR),
            screenshots: AtomicU64::new(0),
        }
    }

    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = dir.into();
        self
    }

    /// Unique scratch file for one screenshot of `display_id`.
    fn screenshot_path(&self, display_id: DisplayId) -> PathBuf {
        let n = self.screenshots.fetch_add(1, Ordering::Relaxed);
        self.scratch_dir.join(format!(
            "vdisp_screenshot_{}_{display_id}_{n}.png",
            std::process::id()
        ))
    }

    /// `package/activity` of the package's launcher activity.
    fn resolve_launch_component(&self, package: &str) -> Result<String, VdispError> {
        let out = run(
            "cmd",
            &[
                "package",
                "resolve-activity",
                "--brief",
                "-c",
                "android.intent.category.LAUNCHER",
                package,
            ],
        )?;
        let stdout = String::from_utf8_lossy(&out.stdout);
        parse_component(&stdout)
            .ok_or_else(|| VdispError::Other(format!("no launch activity for {package}")))
    }
}

fn read_api_level() -> Option<u32> {
    let out = Command::new("getprop")
        .arg("ro.build.version.sdk")
        .output()
        .ok()?;
    String::from_utf8_lossy(&out.stdout).trim().parse().ok()
}

/// Last `pkg/activity` line of `resolve-activity --brief` output.
fn parse_component(stdout: &str) -> Option<String> {
    stdout
        .lines()
        .map(str::trim)
        .rev()
        .find(|line| line.contains('/') && !line.contains(' '))
        .map(str::to_string)
}

impl DisplayPlatform for ShellPlatform {
    fn api_level(&self) -> u32 {
        self.api_level
    }

    fn create_encoder(&self, _config: &EncoderConfig) -> Result<Arc<dyn VideoEncoder>, VdispError> {
        Err(VdispError::Unsupported("hardware encoder"))
    }

    fn create_virtual_display(
        &self,
        _request: &VirtualDisplayRequest,
        _surface: &Arc<dyn RenderSurface>,
    ) -> Result<Box<dyn VirtualDisplay>, VdispError> {
        Err(VdispError::Unsupported("virtual display"))
    }

    fn create_input_backend(&self) -> Result<Arc<dyn InputBackend>, VdispError> {
        Ok(Arc::new(ShellInput))
    }

    fn launch_app(&self, package: &str, display_id: DisplayId) -> Result<(), VdispError> {
        let component = self.resolve_launch_component(package)?;
        let display = display_id.to_string();
        let out = run(
            "am",
            &["start", "--display", &display, "-n", &component, "-f", "0x10000000"],
        )?;
        if !out.status.success() {
            return Err(VdispError::Other(format!(
                "am start {component} exited with {}",
                out.status
            )));
        }
        Ok(())
    }

    fn capture_screenshot(&self, display_id: DisplayId) -> Result<Option<Vec<u8>>, VdispError> {
        let path = self.screenshot_path(display_id);
        let path_str = path.to_string_lossy().into_owned();
        let display = display_id.to_string();

        let result = run("screencap", &["-d", &display, "-p", &path_str]).map(|out| {
            if !out.status.success() {
                warn!(display_id, "screencap exited with {}", out.status);
                return None;
            }
            match std::fs::read(&path) {
                Ok(data) if !data.is_empty() => Some(data),
                Ok(_) => {
                    warn!(display_id, "screencap produced an empty file");
                    None
                }
                Err(e) => {
                    warn!(display_id, "screencap output unreadable: {e}");
                    None
                }
            }
        });

        let _ = std::fs::remove_file(&path);
        result
    }
}

// ── ShellInput ───────────────────────────────────────────────────

/// Replays events through the `input` tool.
///
/// `input keyevent` always sends a full press, so key-up events are
/// skipped. Meta state is not expressible and is dropped.
struct ShellInput;

impl InputBackend for ShellInput {
    fn inject(&self, event: &InputEvent) -> Result<(), VdispError> {
        let display = event.display_id().to_string();
        let args: Vec<String> = match event {
            InputEvent::Motion(m) => {
                let action = match m.action_masked() {
                    motion_action::DOWN => "DOWN",
                    motion_action::UP => "UP",
                    motion_action::MOVE => "MOVE",
                    motion_action::CANCEL => "CANCEL",
                    other => {
                        debug!("motion action {other} not supported by input tool");
                        return Ok(());
                    }
                };
                vec![
                    "-d".into(),
                    display,
                    "motionevent".into(),
                    action.into(),
                    format!("{}", m.x.round() as i32),
                    format!("{}", m.y.round() as i32),
                ]
            }
            InputEvent::Key(k) if k.action == key_action::DOWN => vec![
                "-d".into(),
                display,
                "keyevent".into(),
                k.key_code.to_string(),
            ],
            InputEvent::Key(_) => return Ok(()),
        };

        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let out = run("input", &args)?;
        if !out.status.success() {
            return Err(VdispError::Other(format!("input exited with {}", out.status)));
        }
        Ok(())
    }
}
