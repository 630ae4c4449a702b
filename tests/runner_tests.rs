use std::collections::HashMap;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use script_runner::console::{self, ConsoleHost, ConsoleWindow};
use script_runner::engine::{EngineError, ScriptEngine};
use script_runner::executor::EXECUTION_FAILED;
use script_runner::host::{CommandData, CommandResult, ExternalCommand, HostApplication};
use script_runner::journal::{DEBUG_MODE, LOG_FILE, SCRIPT_SOURCE, SEARCH_PATHS};
use script_runner::runner::RunnerCommand;
use script_runner::stream::ConsoleStream;

type Behavior =
    Arc<dyn Fn(&Path, &mut ConsoleStream, &mut ConsoleStream) -> Result<i32, EngineError> + Send + Sync>;

/// Engine that runs a closure instead of an interpreter.
struct FakeEngine {
    behavior: Behavior,
    streams: Option<(ConsoleStream, ConsoleStream)>,
    seen_paths: Arc<Mutex<Vec<PathBuf>>>,
}

impl ScriptEngine for FakeEngine {
    fn set_search_paths(&mut self, paths: &[PathBuf]) -> Result<(), EngineError> {
        self.seen_paths.lock().unwrap().extend_from_slice(paths);
        Ok(())
    }

    fn set_io(&mut self, stdout: ConsoleStream, stdin: ConsoleStream) {
        self.streams = Some((stdout, stdin));
    }

    fn set_log_file(&mut self, _path: &Path) {}

    fn set_host(&mut self, _host: Arc<HostApplication>) {}

    fn run_file(&mut self, script: &Path) -> Result<i32, EngineError> {
        let (mut out, mut input) = self.streams.take().ok_or(EngineError::StreamsNotBound)?;
        (self.behavior)(script, &mut out, &mut input)
    }
}

struct Harness {
    host: ConsoleHost,
    command: RunnerCommand<Box<dyn Fn() -> FakeEngine + Send>>,
    factory_calls: Arc<AtomicUsize>,
    seen_paths: Arc<Mutex<Vec<PathBuf>>>,
    _dir: tempfile::TempDir,
    log_file: PathBuf,
}

fn harness(
    behavior: impl Fn(&Path, &mut ConsoleStream, &mut ConsoleStream) -> Result<i32, EngineError>
        + Send
        + Sync
        + 'static,
) -> Harness {
    let behavior: Behavior = Arc::new(behavior);
    let (window, host) = console::channel();
    let window: Arc<dyn ConsoleWindow> = Arc::new(window);
    let factory_calls = Arc::new(AtomicUsize::new(0));
    let seen_paths = Arc::new(Mutex::new(Vec::new()));

    let calls = Arc::clone(&factory_calls);
    let paths = Arc::clone(&seen_paths);
    let factory: Box<dyn Fn() -> FakeEngine + Send> = Box::new(move || {
        calls.fetch_add(1, Ordering::SeqCst);
        FakeEngine {
            behavior: Arc::clone(&behavior),
            streams: None,
            seen_paths: Arc::clone(&paths),
        }
    });

    let dir = tempfile::tempdir().unwrap();
    let log_file = dir.path().join("logs").join("run.log");
    Harness {
        host,
        command: RunnerCommand::new(window, factory),
        factory_calls,
        seen_paths,
        _dir: dir,
        log_file,
    }
}

fn journal(log_file: &Path, search_paths: &str) -> HashMap<String, String> {
    HashMap::from([
        (SCRIPT_SOURCE.to_string(), "/scripts/main.py".to_string()),
        (SEARCH_PATHS.to_string(), search_paths.to_string()),
        (LOG_FILE.to_string(), log_file.to_string_lossy().into_owned()),
    ])
}

fn command_data(journal_data: HashMap<String, String>) -> CommandData {
    CommandData::new(Arc::new(HostApplication::new("test-host", "1.0")), journal_data)
}

#[test]
fn hello_with_bom_succeeds_and_renders_one_line() {
    let mut h = harness(|_, out, _| {
        out.write_all(&[0xEF, 0xBB, 0xBF])?;
        out.write_all(b"hello\n")?;
        Ok(0)
    });

    let data = command_data(journal(&h.log_file, ""));
    assert_eq!(h.command.execute(&data), CommandResult::Succeeded);

    h.host.process_pending();
    assert!(h.host.is_visible());
    assert_eq!(h.host.document().rendered_lines(), vec!["hello"]);
    assert!(fs::read_to_string(&h.log_file).unwrap().contains("script completed"));
}

#[test]
fn truncated_final_character_is_still_rendered() {
    let mut h = harness(|_, out, _| {
        out.write_all(&[0xEF, 0xBB, 0xBF])?;
        out.write_all(&[b'o', b'k', b'\n', 0xE2, 0x86])?;
        Ok(0)
    });

    let data = command_data(journal(&h.log_file, ""));
    assert_eq!(h.command.execute(&data), CommandResult::Succeeded);

    h.host.process_pending();
    assert_eq!(h.host.document().rendered_lines(), vec!["ok", "\u{FFFD}"]);
}

#[test]
fn missing_log_file_cancels_before_building_an_engine() {
    let h = harness(|_, _, _| Ok(0));
    let mut data = journal(&h.log_file, "");
    data.remove(LOG_FILE);

    assert_eq!(h.command.execute(&command_data(data)), CommandResult::Cancelled);
    assert_eq!(h.factory_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn engine_error_cancels_and_is_logged() {
    let h = harness(|_, _, _| {
        Err(EngineError::Io(io::Error::other("NameError: name 'x' is not defined")))
    });

    let data = command_data(journal(&h.log_file, ""));
    assert_eq!(h.command.execute(&data), CommandResult::Cancelled);

    let log = fs::read_to_string(&h.log_file).unwrap();
    assert!(log.contains("script execution failed"));
    assert!(log.contains("NameError"));
}

#[test]
fn engine_panic_is_contained() {
    let h = harness(|_, _, _| panic!("interpreter crashed"));

    let data = command_data(journal(&h.log_file, ""));
    assert_eq!(h.command.execute(&data), CommandResult::Cancelled);
    assert!(fs::read_to_string(&h.log_file).unwrap().contains("interpreter crashed"));
}

#[test]
fn non_zero_exit_code_cancels() {
    let h = harness(|_, _, _| Ok(3));

    let data = command_data(journal(&h.log_file, ""));
    assert_eq!(h.command.execute(&data), CommandResult::Cancelled);
    let log = fs::read_to_string(&h.log_file).unwrap();
    assert!(log.contains("non-zero"));
    assert_ne!(EXECUTION_FAILED, 0);
}

#[test]
fn search_paths_reach_the_engine_in_order() {
    let h = harness(|_, _, _| Ok(0));

    let data = command_data(journal(&h.log_file, "/lib/a;;/lib/b;/lib/c"));
    assert_eq!(h.command.execute(&data), CommandResult::Succeeded);
    assert_eq!(
        *h.seen_paths.lock().unwrap(),
        vec![
            PathBuf::from("/lib/a"),
            PathBuf::from("/lib/b"),
            PathBuf::from("/lib/c")
        ]
    );
}

#[test]
fn debug_mode_writes_detail_records() {
    let h = harness(|_, _, _| Ok(0));

    let mut data = journal(&h.log_file, "/lib/a");
    data.insert(DEBUG_MODE.to_string(), "true".to_string());
    assert_eq!(h.command.execute(&command_data(data)), CommandResult::Succeeded);
    assert!(fs::read_to_string(&h.log_file).unwrap().contains("engine configured"));
}

#[test]
fn script_reads_a_line_typed_into_the_console() {
    let Harness {
        mut host,
        command,
        log_file,
        _dir,
        ..
    } = harness(|_, out, input| {
        out.write_all(&[0xEF, 0xBB, 0xBF])?;
        out.write_all(b"name?\n")?;
        let mut buf = [0u8; 64];
        let n = input.read(&mut buf)?;
        let name = String::from_utf8_lossy(&buf[..n]).trim_end().to_string();
        out.write_all(format!("hi {name}\n").as_bytes())?;
        Ok(0)
    });

    let data = command_data(journal(&log_file, ""));
    let worker = thread::spawn(move || command.execute(&data));

    let deadline = Instant::now() + Duration::from_secs(5);
    while !host.has_input() || !host.is_visible() {
        assert!(Instant::now() < deadline, "script never attached to the console");
        host.process_pending();
        thread::sleep(Duration::from_millis(5));
    }
    assert!(host.submit_line("ada"));

    assert_eq!(worker.join().unwrap(), CommandResult::Succeeded);
    host.process_pending();
    assert_eq!(host.document().rendered_lines(), vec!["name?", "hi ada"]);
}

#[test]
fn closing_the_console_ends_a_pending_read() {
    let Harness {
        mut host,
        command,
        log_file,
        _dir,
        ..
    } = harness(|_, out, input| {
        out.write_all(b"waiting\n")?;
        let mut buf = [0u8; 16];
        match input.read(&mut buf) {
            Ok(_) => Ok(0),
            Err(err) => Err(EngineError::Io(err)),
        }
    });

    let data = command_data(journal(&log_file, ""));
    let worker = thread::spawn(move || command.execute(&data));

    let deadline = Instant::now() + Duration::from_secs(5);
    while !host.is_visible() {
        assert!(Instant::now() < deadline, "script never showed the console");
        host.process_pending();
        thread::sleep(Duration::from_millis(5));
    }
    host.close();

    assert_eq!(worker.join().unwrap(), CommandResult::Cancelled);
}
