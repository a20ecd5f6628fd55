use std::process;
use std::sync::mpsc;
use std::time::Duration;

use clap::Parser;
use knit_cli::KnitCli;
use knit_core::AnyResult;
use knit_core::Discovery;
use knit_core::KnitContext;
use knit_core::KnitError;
use knit_core::KnitOptions;
use knit_core::LogSink;
use owo_colors::OwoColorize;
use tracing_subscriber::EnvFilter;

static USE_COLOR: std::sync::atomic::AtomicBool = std::sync::atomic::AtomicBool::new(true);

fn color_enabled() -> bool {
	USE_COLOR.load(std::sync::atomic::Ordering::Relaxed)
}

/// Apply ANSI color codes only when color is enabled.
macro_rules! colored {
	($text:expr,red) => {
		if color_enabled() {
			format!("{}", $text.red())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,yellow) => {
		if color_enabled() {
			format!("{}", $text.yellow())
		} else {
			format!("{}", $text)
		}
	};
}

/// Exit status when check mode finds files to write.
const EXIT_OUTDATED: i32 = 1;
/// Exit status of a fatal error.
const EXIT_ERROR: i32 = 2;

fn main() {
	let args = KnitCli::parse();

	// Respect NO_COLOR env var and --no-color flag.
	let use_color = !args.no_color && std::env::var_os("NO_COLOR").is_none();
	if !use_color {
		USE_COLOR.store(false, std::sync::atomic::Ordering::Relaxed);
	}

	miette::set_hook(Box::new(move |_| {
		Box::new(
			miette::MietteHandlerOpts::new()
				.color(use_color)
				.unicode(use_color)
				.build(),
		)
	}))
	.ok();

	init_tracing(args.verbose, use_color);

	let code = match run(&args) {
		Ok(code) => code,
		Err(e) => {
			report(e);
			EXIT_ERROR
		}
	};

	process::exit(code);
}

fn init_tracing(verbose: bool, use_color: bool) {
	let default_filter = if verbose {
		"knit_core=debug,info"
	} else {
		"info"
	};
	let filter = EnvFilter::try_from_default_env()
		.or_else(|_| EnvFilter::try_new(default_filter))
		.unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_target(false)
		.with_ansi(use_color)
		.without_time()
		.compact()
		.try_init()
		.ok();
}

/// Render `error` through miette when it is a knit diagnostic.
fn report(error: Box<dyn std::error::Error>) {
	match error.downcast::<KnitError>() {
		Ok(knit_error) => {
			let report: miette::Report = (*knit_error).into();
			eprintln!("{report:?}");
		}
		Err(e) => {
			eprintln!("{} {e}", colored!("error:", red));
		}
	}
}

fn run(args: &KnitCli) -> AnyResult<i32> {
	let code = run_once(args)?;

	if !args.watch {
		return Ok(code);
	}

	println!("\nWatching for file changes... (press Ctrl+C to stop)");

	let root = args.root();
	let (tx, rx) = mpsc::channel();

	let mut watcher =
		notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| {
			if let Ok(event) = res {
				if matches!(
					event.kind,
					notify::EventKind::Modify(_) | notify::EventKind::Create(_)
				) {
					let _ = tx.send(());
				}
			}
		})?;

	use notify::Watcher;
	watcher.watch(&root, notify::RecursiveMode::Recursive)?;

	loop {
		rx.recv()?;
		// Debounce: drain additional events within 200ms.
		while rx.recv_timeout(Duration::from_millis(200)).is_ok() {}

		println!("\nFile change detected, knitting...");
		if let Err(e) = run_once(args) {
			report(e);
		}

		// Drop the events of files this run wrote.
		while rx.recv_timeout(Duration::from_millis(200)).is_ok() {}
	}
}

fn run_once(args: &KnitCli) -> AnyResult<i32> {
	let root = args.root();
	let files = if args.files.is_empty() {
		Discovery::default().discover(&root)?
	} else {
		args.files.clone()
	};

	if files.is_empty() {
		println!("No documents found under {}.", root.display());
		return Ok(0);
	}

	let mut options = KnitOptions::new(root, files);
	options.check = args.check;
	options.strict_check = args.strict_check;
	options.line_separator = args.line_separator();
	options.log_sink = LogSink::Tracing;

	let mut ctx = KnitContext::new(options)?;
	ctx.try_process()?;

	let n_outdated = ctx.log().n_outdated();

	if args.check && n_outdated > 0 {
		println!(
			"{}",
			colored!(
				format!("Run `knit` to write {n_outdated} missing/outdated files."),
				yellow
			)
		);
		return Ok(EXIT_OUTDATED);
	}

	Ok(0)
}
