use std::{
    cmp::Reverse,
    ffi::OsStr,
    fs,
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
    sync::{Arc, OnceLock},
    time::SystemTime,
};

use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDate};
use flate2::{Compression, write::GzEncoder};
use parking_lot::Mutex;
use tracing::warn;
use tracing_appender::non_blocking::{self, WorkerGuard};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const LOG_DIR_ENV: &str = "ADPULSE_LOG_DIR";
const LOG_PREFIX: &str = "adpulse";
const ACTIVE_FILE_NAME: &str = "adpulse.log";
const MAX_RETAINED_LOGS: usize = 14;

static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();
static PANIC_HOOK: OnceLock<()> = OnceLock::new();

/// Installs the global subscriber: stdout plus a daily-rotating file
/// layer. Rotated files are gzip-compressed and pruned to a fixed
/// retention count. Idempotent.
pub fn init() -> Result<()> {
    if FILE_GUARD.get().is_some() {
        return Ok(());
    }

    let log_dir = resolve_log_dir()?;
    let writer = DailyRotatingWriter::new(log_dir)?;
    let (file_writer, guard) = non_blocking::NonBlockingBuilder::default()
        .lossy(false)
        .finish(writer);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let stdout_layer = fmt::layer().with_target(false);
    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_target(true)
        .with_ansi(false);

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer);

    match subscriber.try_init() {
        Ok(_) => {
            let _ = FILE_GUARD.set(guard);
            install_panic_hook();
        }
        Err(_) => {
            // Subscriber already installed elsewhere; drop guard so the
            // worker thread exits.
            drop(guard);
        }
    }

    Ok(())
}

#[derive(Clone)]
struct DailyRotatingWriter {
    inner: Arc<WriterInner>,
}

struct WriterInner {
    state: Mutex<WriterState>,
    log_dir: PathBuf,
}

struct WriterState {
    file: Option<BufWriter<fs::File>>,
    current_day: NaiveDate,
}

impl DailyRotatingWriter {
    fn new<P: Into<PathBuf>>(dir: P) -> Result<Self> {
        let log_dir = dir.into();
        fs::create_dir_all(&log_dir)
            .with_context(|| format!("failed to create log directory {}", log_dir.display()))?;

        let active_path = log_dir.join(ACTIVE_FILE_NAME);
        let now = Local::now();

        // A leftover active file from a previous day is rotated out
        // before the first write lands in it.
        if let Ok(metadata) = fs::metadata(&active_path) {
            let modified_at = metadata
                .modified()
                .ok()
                .map(DateTime::<Local>::from)
                .unwrap_or(now);
            if modified_at.date_naive() != now.date_naive() {
                Self::rotate_out(&log_dir, &active_path, modified_at)?;
            }
        }

        let state = WriterState {
            file: Some(Self::open_writer(&active_path)?),
            current_day: now.date_naive(),
        };

        Ok(Self {
            inner: Arc::new(WriterInner {
                state: Mutex::new(state),
                log_dir,
            }),
        })
    }

    fn open_writer(path: &Path) -> Result<BufWriter<fs::File>> {
        let file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open log file {}", path.display()))?;
        Ok(BufWriter::new(file))
    }

    fn rotate_out(log_dir: &Path, active_path: &Path, stamp: DateTime<Local>) -> Result<()> {
        let rotated_path = unique_rotated_path(log_dir, stamp);
        fs::rename(active_path, &rotated_path).with_context(|| {
            format!(
                "failed to rotate log {} -> {}",
                active_path.display(),
                rotated_path.display()
            )
        })?;
        if let Err(err) = compress_file(&rotated_path) {
            warn!(
                "failed to compress rotated log {}: {}",
                rotated_path.display(),
                err
            );
        }
        if let Err(err) = enforce_retention(log_dir) {
            warn!(
                "failed to enforce log retention in {}: {}",
                log_dir.display(),
                err
            );
        }
        Ok(())
    }

    fn rotate(&self, state: &mut WriterState, now: DateTime<Local>) -> Result<()> {
        if let Some(mut writer) = state.file.take() {
            if let Err(err) = writer.flush() {
                eprintln!("failed to flush log file before rotation: {err}");
            }
        }

        let active_path = self.active_path();
        if active_path.exists() {
            Self::rotate_out(&self.inner.log_dir, &active_path, now)?;
        }

        state.file = Some(Self::open_writer(&active_path)?);
        state.current_day = now.date_naive();
        Ok(())
    }

    fn active_path(&self) -> PathBuf {
        self.inner.log_dir.join(ACTIVE_FILE_NAME)
    }
}

impl Write for DailyRotatingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let now = Local::now();
        let mut state = self.inner.state.lock();

        if now.date_naive() != state.current_day {
            if let Err(err) = self.rotate(&mut state, now) {
                eprintln!("failed to rotate logs: {err:?}");
            }
        }

        if state.file.is_none() {
            state.file = Some(Self::open_writer(&self.active_path()).map_err(io::Error::other)?);
            state.current_day = now.date_naive();
        }

        let writer = state
            .file
            .as_mut()
            .expect("log writer must be available after rotation");
        writer.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut state = self.inner.state.lock();
        if let Some(writer) = state.file.as_mut() {
            writer.flush()
        } else {
            Ok(())
        }
    }
}

fn unique_rotated_path(dir: &Path, timestamp: DateTime<Local>) -> PathBuf {
    let base = format!("{}_{}", LOG_PREFIX, timestamp.format("%Y-%m-%d_%H-%M-%S"));
    let mut candidate = dir.join(format!("{}.log", base));
    let mut counter = 1;
    while candidate.exists() {
        candidate = dir.join(format!("{}-{}.log", base, counter));
        counter += 1;
    }
    candidate
}

fn compress_file(path: &Path) -> Result<PathBuf> {
    let new_extension = match path.extension().and_then(OsStr::to_str) {
        Some(ext) if !ext.is_empty() => format!("{ext}.gz"),
        _ => "log.gz".to_string(),
    };
    let gz_path = path.with_extension(new_extension);

    let mut input = fs::File::open(path)
        .with_context(|| format!("failed to open {} for compression", path.display()))?;
    let output = fs::File::create(&gz_path)
        .with_context(|| format!("failed to create compressed log {}", gz_path.display()))?;
    let mut encoder = GzEncoder::new(output, Compression::default());
    io::copy(&mut input, &mut encoder)
        .with_context(|| format!("failed to compress {}", path.display()))?;
    encoder
        .finish()
        .with_context(|| format!("failed to finish compression for {}", gz_path.display()))?;
    drop(input);
    fs::remove_file(path)
        .with_context(|| format!("failed to remove uncompressed log {}", path.display()))?;

    Ok(gz_path)
}

fn enforce_retention(log_dir: &Path) -> Result<()> {
    let mut entries: Vec<(SystemTime, PathBuf)> = Vec::new();
    for entry in fs::read_dir(log_dir)
        .with_context(|| format!("failed to inspect log directory {}", log_dir.display()))?
    {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let file_name = match path.file_name().and_then(OsStr::to_str) {
            Some(name) => name,
            None => continue,
        };
        if file_name == ACTIVE_FILE_NAME || !file_name.starts_with(LOG_PREFIX) {
            continue;
        }
        let modified = entry
            .metadata()
            .ok()
            .and_then(|metadata| metadata.modified().ok())
            .unwrap_or(SystemTime::UNIX_EPOCH);
        entries.push((modified, path));
    }

    entries.sort_by_key(|(modified, _)| Reverse(*modified));
    while entries.len() > MAX_RETAINED_LOGS {
        if let Some((_, path)) = entries.pop() {
            if let Err(err) = fs::remove_file(&path) {
                warn!("failed to remove expired log {}: {}", path.display(), err);
            }
        }
    }

    Ok(())
}

fn resolve_log_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(LOG_DIR_ENV) {
        let path = PathBuf::from(dir);
        if path.is_absolute() {
            return Ok(path);
        }
        let base =
            std::env::current_dir().context("failed to resolve current working directory")?;
        return Ok(base.join(path));
    }

    let home = dirs::home_dir().context("unable to locate user home directory")?;
    Ok(home.join(".adpulse").join("logs"))
}

fn install_panic_hook() {
    PANIC_HOOK.get_or_init(|| {
        let default_hook = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            if let Some(location) = info.location() {
                tracing::error!(
                    target: "panic",
                    file = location.file(),
                    line = location.line(),
                    message = %info
                );
            } else {
                tracing::error!(target: "panic", message = %info);
            }
            default_hook(info);
        }));
    });
}
