use cap_std::fs_utf8::Dir;
use miette::{Context, IntoDiagnostic, Result};

pub const LOG_FILE_NAME: &str = "lodebar.log";
pub const LOG_FILTER_ENV: &str = "LODEBAR_LOG";

/// Installs the global subscriber.
/// Events go to stderr and to `lodebar.log` inside the data dir. The returned guard must be kept alive
/// until exit, otherwise buffered lines of the log file are lost.
pub fn install_tracing(lodebar_dir: &Dir) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::{fmt, EnvFilter};
    let filter_layer = EnvFilter::try_from_env(LOG_FILTER_ENV)
        .or_else(|_| EnvFilter::try_new("info"))
        .into_diagnostic()
        .wrap_err("failed to create log filter")?;
    // create log file in the data dir. This will also serve as a check that the directory is "writeable" by us
    let writer = std::io::BufWriter::new(
        lodebar_dir
            .create(LOG_FILE_NAME)
            .into_diagnostic()
            .wrap_err("failed to create lodebar.log file")?,
    );
    let (nb, guard) = tracing_appender::non_blocking(writer);
    let file_layer = fmt::layer()
        .with_ansi(false)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_writer(nb);
    let stderr_layer = fmt::layer()
        .with_target(false)
        .compact()
        .with_writer(std::io::stderr);
    tracing_subscriber::registry()
        .with(filter_layer)
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .into_diagnostic()
        .wrap_err("failed to install global tracing subscriber")?;
    Ok(guard)
}

/// Routes rendered diagnostics and panics into the log file before the process dies.
/// Must run after [install_tracing], or the crash report only reaches stderr.
pub fn install_miette_panic_hooks() -> Result<()> {
    miette::set_hook(Box::new(|diagnostic| {
        let handler = Box::new(miette::NarratableReportHandler::new());
        let mut rendered = String::new();
        match handler.render_report(&mut rendered, diagnostic) {
            Ok(()) => tracing::error!(report = %rendered, "lodebar stopped with an error"),
            Err(e) => tracing::error!("failed to render report: {e}"),
        }
        handler
    }))
    .wrap_err("failed to install miette hook")?;

    std::panic::set_hook(Box::new(|panic_info| {
        let thread = std::thread::current();
        let thread = thread.name().unwrap_or("<unnamed>");
        let mut report: Result<()> = Err(LodebarPanic(panic_message(panic_info.payload())).into());
        if let Some(loc) = panic_info.location() {
            report = report
                .with_context(|| format!("at {}:{}:{}", loc.file(), loc.line(), loc.column()));
        }
        if let Err(err) = report.with_context(|| format!("thread '{thread}' panicked")) {
            eprintln!("Error: {err:?}");
            tracing::error!("lodebar crashed: {err:?}");
        }
    }));
    Ok(())
}

#[derive(Debug, thiserror::Error, miette::Diagnostic)]
#[error("{0}")]
#[diagnostic(
    code(lodebar::panic),
    help("set `RUST_BACKTRACE=1` to get a backtrace and attach lodebar.log when reporting this")
)]
struct LodebarPanic(String);

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_owned()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_owned()
    }
}
