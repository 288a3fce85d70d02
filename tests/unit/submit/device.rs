use super::*;

fn scratch_node(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("v2d-device-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    std::fs::write(&path, b"").unwrap();
    path
}

#[test]
fn missing_node_is_unavailable() {
    let path = std::env::temp_dir().join("v2d-definitely-missing-node");
    let err = DeviceNode::open(&path).unwrap_err();
    match err {
        V2dError::DeviceUnavailable { path: p, source } => {
            assert_eq!(p, path);
            assert_eq!(source.kind(), io::ErrorKind::NotFound);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn node_writes_whole_records() {
    let path = scratch_node("records");
    let node = DeviceNode::open(&path).unwrap();
    assert_eq!(node.path(), path);

    let mut rec = TaskRecord::new();
    assert_eq!(node.write_task(&mut rec).unwrap(), TaskRecord::wire_size());
    assert_eq!(node.write_task(&mut rec).unwrap(), TaskRecord::wire_size());
    assert_eq!(
        std::fs::metadata(&path).unwrap().len(),
        2 * TaskRecord::wire_size() as u64
    );
}

#[test]
fn node_is_opened_close_on_exec() {
    let path = scratch_node("cloexec");
    let node = DeviceNode::open(&path).unwrap();
    // SAFETY: querying descriptor flags of an fd owned by `node`.
    let fd_flags = unsafe { libc::fcntl(node.as_fd().as_raw_fd(), libc::F_GETFD) };
    // SAFETY: as above, status flags.
    let fl_flags = unsafe { libc::fcntl(node.as_fd().as_raw_fd(), libc::F_GETFL) };
    assert!(fd_flags & libc::FD_CLOEXEC != 0);
    assert!(fl_flags & libc::O_NONBLOCK != 0);
    assert_eq!(fl_flags & libc::O_ACCMODE, libc::O_RDWR);
}

#[test]
fn shared_node_is_opened_once_and_released_on_demand() {
    let path = scratch_node("shared");

    let first = open_shared(&path).unwrap();
    let second = open_shared(&path).unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    let threads: Vec<_> = (0..4)
        .map(|_| {
            let path = path.clone();
            std::thread::spawn(move || open_shared(&path).unwrap())
        })
        .collect();
    for t in threads {
        assert!(Arc::ptr_eq(&first, &t.join().unwrap()));
    }

    assert!(close_shared(&path));
    assert!(!close_shared(&path));

    let reopened = open_shared(&path).unwrap();
    assert!(!Arc::ptr_eq(&first, &reopened));
    assert!(close_shared(&path));
}

#[test]
fn failed_shared_open_is_retried() {
    let dir = std::env::temp_dir().join(format!("v2d-late-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("late-node");
    let _ = std::fs::remove_file(&path);

    let provider = SharedDevice::new(&path);
    assert!(matches!(
        provider.acquire(),
        Err(V2dError::DeviceUnavailable { .. })
    ));

    std::fs::write(&path, b"").unwrap();
    assert!(provider.acquire().is_ok());
    assert!(close_shared(&path));
}

#[test]
fn default_provider_targets_the_v2d_node() {
    assert_eq!(SharedDevice::default().path(), Path::new(DEFAULT_DEVICE_PATH));
}
