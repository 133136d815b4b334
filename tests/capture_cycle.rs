// CLASSIFICATION: COMMUNITY
// Filename: capture_cycle.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-16

use std::convert::Infallible;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use blackbox::orchestrator::SAVED_RECORD_FILE;
use blackbox::storage::RawFile;
use blackbox::{
    parse_record, render, Blackbox, BlackboxConfig, BlackboxError, CycleState, ErrorInfo,
    FileModule, ModuleOps, Platform, StdStorage, Storage, WaitTimeout, WriteMode,
};
use tempfile::tempdir;

/// Platform whose reboot comes back so the test keeps running.
struct TestPlatform {
    path: PathBuf,
    reboots: AtomicUsize,
    broken_storage: bool,
}

struct BrokenStorage;

impl Storage for BrokenStorage {
    fn open(&self, _path: &Path, _mode: WriteMode) -> io::Result<Box<dyn RawFile + '_>> {
        Err(io::Error::new(io::ErrorKind::Other, "flash offline"))
    }

    fn create_dir_all(&self, _path: &Path) -> io::Result<()> {
        Ok(())
    }
}

impl TestPlatform {
    fn new(path: PathBuf) -> Arc<Self> {
        Arc::new(Self {
            path,
            reboots: AtomicUsize::new(0),
            broken_storage: false,
        })
    }

    fn broken(path: PathBuf) -> Arc<Self> {
        Arc::new(Self {
            path,
            reboots: AtomicUsize::new(0),
            broken_storage: true,
        })
    }
}

impl Platform for TestPlatform {
    fn fault_log_path(&self) -> PathBuf {
        self.path.clone()
    }

    fn storage(&self) -> &dyn Storage {
        if self.broken_storage {
            return &BrokenStorage;
        }
        &StdStorage
    }

    fn reboot(&self) -> blackbox::Result<Infallible> {
        self.reboots.fetch_add(1, Ordering::SeqCst);
        Err(BlackboxError::adapter("reboot", -1))
    }
}

/// Module that records the order of adapter calls and critical section depth.
#[derive(Default)]
struct TracingModule {
    calls: Mutex<Vec<String>>,
    inside: AtomicUsize,
    peak: AtomicUsize,
    fail_dump: bool,
}

impl ModuleOps for TracingModule {
    fn name(&self) -> &str {
        "kernel"
    }

    fn dump(&self, _log_dir: &Path, info: &mut ErrorInfo) -> blackbox::Result<()> {
        let now = self.inside.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.calls.lock().unwrap().push(format!("dump:{}", info.event()));
        thread::sleep(Duration::from_millis(2));
        if self.fail_dump {
            return Err(BlackboxError::adapter("dump", -3));
        }
        Ok(())
    }

    fn reset(&self, info: &ErrorInfo) {
        self.calls.lock().unwrap().push(format!("reset:{}", info.event()));
        self.inside.fetch_sub(1, Ordering::SeqCst);
    }

    fn last_log_info(&self) -> blackbox::Result<Option<ErrorInfo>> {
        self.calls.lock().unwrap().push("last_log_info".into());
        Ok(None)
    }

    fn save_last_log(&self, _log_dir: &Path, _info: &ErrorInfo) -> blackbox::Result<()> {
        self.calls.lock().unwrap().push("save_last_log".into());
        Ok(())
    }
}

fn config(root: &Path) -> BlackboxConfig {
    BlackboxConfig {
        log_root: root.to_path_buf(),
        guard_timeout: WaitTimeout::from_millis(10_000),
        ..BlackboxConfig::default()
    }
}

#[test]
fn watchdog_scenario_writes_exact_record() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("error_info.txt");
    let platform = TestPlatform::new(path.clone());
    let module = Arc::new(TracingModule::default());
    let bbox = Blackbox::new(config(dir.path()), platform.clone()).unwrap();
    bbox.register_module(module.clone()).unwrap();

    let err = bbox
        .handle_fault(ErrorInfo::new("WDT_TIMEOUT", "kernel", "pc=0x1000"))
        .unwrap_err();
    assert!(matches!(err, BlackboxError::RebootReturned(_)));

    assert_eq!(
        fs::read(&path).unwrap(),
        b"#### error info ####\r\nevent: WDT_TIMEOUT\r\nmodule: kernel\r\nerrorDesc: pc=0x1000\r\n"
    );
    assert_eq!(
        *module.calls.lock().unwrap(),
        vec!["dump:WDT_TIMEOUT", "last_log_info", "reset:WDT_TIMEOUT"]
    );
    assert_eq!(platform.reboots.load(Ordering::SeqCst), 1);
    assert_eq!(bbox.state(), CycleState::Idle);
}

#[test]
fn previous_record_survives_new_fault() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("error_info.txt");
    let prev = ErrorInfo::new("PANIC", "kernel", "old boot");
    fs::write(&path, render(&prev).unwrap()).unwrap();

    let platform = TestPlatform::new(path.clone());
    let bbox = Blackbox::new(config(dir.path()), platform).unwrap();
    bbox.register_module(Arc::new(FileModule::new("kernel", &path))).unwrap();

    let report = bbox
        .record_fault(ErrorInfo::new("WDT_TIMEOUT", "kernel", "pc=0x2000"))
        .unwrap();
    assert!(report.previous_saved);
    assert!(report.persisted);

    let saved = fs::read(bbox.config().last_log_dir().join("error_info.txt")).unwrap();
    assert_eq!(parse_record(&saved).unwrap(), prev);
    let current = parse_record(&fs::read(&path).unwrap()).unwrap();
    assert_eq!(current, ErrorInfo::new("WDT_TIMEOUT", "kernel", "pc=0x2000"));
}

#[test]
fn write_failures_never_leak_the_guard() {
    let dir = tempdir().unwrap();
    let platform = TestPlatform::broken(dir.path().join("error_info.txt"));
    let bbox = Blackbox::new(config(dir.path()), platform.clone()).unwrap();
    bbox.register_module(Arc::new(TracingModule::default())).unwrap();

    for round in 1..=5 {
        let err = bbox
            .handle_fault(ErrorInfo::new("EXC", "kernel", "bad flash"))
            .unwrap_err();
        assert!(matches!(err, BlackboxError::RebootReturned(_)));
        assert_eq!(platform.reboots.load(Ordering::SeqCst), round);
        let token = bbox.guard().try_acquire().expect("guard still acquirable");
        token.release();
    }
    assert!(!dir.path().join("error_info.txt").exists());
}

#[test]
fn capture_failure_does_not_abort_cycle() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("error_info.txt");
    let bbox = Blackbox::new(config(dir.path()), TestPlatform::new(path.clone())).unwrap();
    bbox.register_module(Arc::new(TracingModule {
        fail_dump: true,
        ..TracingModule::default()
    }))
    .unwrap();

    let report = bbox
        .record_fault(ErrorInfo::new("HARDFAULT", "kernel", "lr=0x4"))
        .unwrap();
    assert!(report.persisted);
    assert!(matches!(
        report.failures.as_slice(),
        [BlackboxError::AdapterFailure { op: "dump", .. }]
    ));
    assert!(path.exists());
}

#[test]
fn concurrent_faults_never_interleave() {
    let dir = tempdir().unwrap();
    let platform = TestPlatform::new(dir.path().join("error_info.txt"));
    let module = Arc::new(TracingModule::default());
    let bbox = Arc::new(Blackbox::new(config(dir.path()), platform.clone()).unwrap());
    bbox.register_module(module.clone()).unwrap();

    let handles: Vec<_> = (0..6)
        .map(|i| {
            let bbox = bbox.clone();
            thread::spawn(move || {
                let event = format!("EVT{i}");
                let _ = bbox.handle_fault(ErrorInfo::new(&event, "kernel", "race"));
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(module.peak.load(Ordering::SeqCst), 1);
    assert_eq!(platform.reboots.load(Ordering::SeqCst), 6);
    let calls = module.calls.lock().unwrap();
    let cycles: Vec<_> = calls.iter().filter(|c| *c != "last_log_info").collect();
    for pair in cycles.chunks(2) {
        let started = pair[0].strip_prefix("dump:").unwrap();
        let finished = pair[1].strip_prefix("reset:").unwrap();
        assert_eq!(started, finished);
    }
}

#[test]
fn busy_guard_reports_timeout() {
    let dir = tempdir().unwrap();
    let cfg = BlackboxConfig {
        guard_timeout: WaitTimeout::from_millis(20),
        ..config(dir.path())
    };
    let bbox = Blackbox::new(cfg, TestPlatform::new(dir.path().join("error_info.txt"))).unwrap();
    let held = bbox.guard().acquire(WaitTimeout::Forever).unwrap();
    let err = bbox
        .notify_error("WDT_TIMEOUT", "kernel", "", true)
        .unwrap_err();
    assert!(matches!(err, BlackboxError::GuardTimeout));
    assert_eq!(bbox.state(), CycleState::Idle);
    held.release();
}

fn boot_dir_of(root: &Path, module: &str) -> PathBuf {
    let dirs: Vec<_> = fs::read_dir(root)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.join(module).is_dir())
        .collect();
    assert_eq!(dirs.len(), 1, "one boot directory expected");
    dirs[0].join(module)
}

#[test]
fn boot_sweep_saves_each_module() {
    let dir = tempdir().unwrap();
    let kernel_log = dir.path().join("kernel.log");
    let driver_log = dir.path().join("driver.log");
    fs::write(&kernel_log, render(&ErrorInfo::new("PANIC", "kernel", "k")).unwrap()).unwrap();

    let platform = TestPlatform::new(dir.path().join("error_info.txt"));
    let bbox = Blackbox::new(config(dir.path()), platform).unwrap();
    bbox.register_module(Arc::new(FileModule::new("kernel", &kernel_log))).unwrap();
    bbox.register_module(Arc::new(FileModule::new("driver", &driver_log))).unwrap();

    assert_eq!(bbox.save_last_logs().unwrap(), 1);
    assert!(!kernel_log.exists());

    let saved = boot_dir_of(dir.path(), "kernel");
    assert!(saved.join("kernel.log").exists());
    let info = parse_record(&fs::read(saved.join(SAVED_RECORD_FILE)).unwrap()).unwrap();
    assert_eq!(info.event(), "PANIC");
    assert_eq!(bbox.guard().available(), 1);
}

#[test]
fn boot_sweep_keeps_torn_record_bytes_on_default_paths() {
    let dir = tempdir().unwrap();
    let cfg = config(dir.path());
    let path = cfg.fault_log_path();
    let torn = b"#### error info ####\r\nevent: WDT_TIMEOUT\r\nmodule: kernel\r\nerrorDesc: pc=0x10";
    fs::write(&path, torn).unwrap();

    let bbox = Blackbox::new(cfg.clone(), TestPlatform::new(path.clone())).unwrap();
    bbox.register_module(Arc::new(FileModule::from_config("kernel", &cfg))).unwrap();
    assert_eq!(bbox.save_last_logs().unwrap(), 1);
    assert!(!path.exists());

    let saved = boot_dir_of(dir.path(), "kernel");
    assert_eq!(fs::read(saved.join(&cfg.fault_log_file)).unwrap(), torn.to_vec());
    let rendered = parse_record(&fs::read(saved.join(SAVED_RECORD_FILE)).unwrap()).unwrap();
    assert_eq!(rendered.event(), "UNPARSED");
}
