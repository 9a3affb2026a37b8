//! Basic integration tests for mmap-view.

use mmap_view::{map, map_len, map_request, unlink, MapError, MapRequest, Mapped};
use std::fs;
use std::path::PathBuf;

fn tmp_path(name: &str) -> PathBuf {
    let mut p = std::env::temp_dir();
    p.push(format!("mmap_view_test_{}_{}", name, std::process::id()));
    p
}

fn pseudo_random(len: usize, seed: u32) -> Vec<u8> {
    let mut state = seed;
    (0..len)
        .map(|_| {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            (state >> 24) as u8
        })
        .collect()
}

#[test]
fn whole_file() {
    let path = tmp_path("whole_file");
    let data = pseudo_random(1024, 1);
    fs::write(&path, &data).expect("seed");

    let buf = map(&path).expect("map");
    assert_eq!(buf.len(), 1024);
    assert_eq!(&buf[..], &data[..]);
    assert!(!buf.is_shared_memory());
    assert!(buf.path().is_absolute());

    drop(buf);
    unlink(&path).expect("unlink");
}

#[test]
fn empty_file_maps_to_empty_buffer() {
    let path = tmp_path("empty_file");
    fs::write(&path, b"").expect("seed");

    let buf = map(&path).expect("map");
    assert_eq!(buf.len(), 0);
    assert!(buf.is_empty());
    buf.flush().expect("flush of nothing");

    drop(buf);
    let _ = fs::remove_file(&path);
}

#[test]
fn shorter_length_maps_prefix() {
    let path = tmp_path("shrink_view");
    let data = pseudo_random(1024, 2);
    fs::write(&path, &data).expect("seed");

    let buf = map_len(&path, 128_u64).expect("map");
    assert_eq!(buf.len(), 128);
    assert_eq!(&buf[..], &data[..128]);
    drop(buf);
    assert_eq!(fs::metadata(&path).expect("meta").len(), 1024);

    let _ = fs::remove_file(&path);
}

#[test]
fn longer_length_extends_with_zeros() {
    let path = tmp_path("grow_view");
    let data = pseudo_random(1024, 3);
    fs::write(&path, &data).expect("seed");

    let buf = map_len(&path, 2048_u64).expect("map");
    assert_eq!(buf.len(), 2048);
    assert_eq!(&buf[..1024], &data[..]);
    assert!(buf[1024..].iter().all(|&b| b == 0));
    assert_eq!(fs::metadata(&path).expect("meta").len(), 2048);

    drop(buf);
    let on_disk = fs::read(&path).expect("read");
    assert_eq!(&on_disk[..1024], &data[..]);
    assert!(on_disk[1024..].iter().all(|&b| b == 0));

    let _ = fs::remove_file(&path);
}

#[test]
fn unusable_lengths_map_whole_file() {
    let path = tmp_path("unusable_lengths");
    fs::write(&path, [5u8; 300]).expect("seed");

    assert_eq!(map_len(&path, 0_u64).expect("zero").len(), 300);
    assert_eq!(map_len(&path, -4_i64).expect("negative").len(), 300);
    assert_eq!(map_len(&path, 0.25_f64).expect("fraction").len(), 300);
    assert_eq!(map_len(&path, f64::NAN).expect("nan").len(), 300);
    assert_eq!(map_len(&path, 1e300_f64).expect("inexact").len(), 300);
    assert_eq!(map_len(&path, 99.9_f64).expect("truncated").len(), 99);
    assert_eq!(fs::metadata(&path).expect("meta").len(), 300);

    let _ = fs::remove_file(&path);
}

#[test]
fn write_remap_read_back() {
    let path = tmp_path("round_trip");
    fs::write(&path, [0u8; 512]).expect("seed");
    let payload = pseudo_random(200, 4);

    {
        let mut buf = map(&path).expect("map");
        buf.update_region(100, &payload).expect("update");
        buf.flush().expect("flush");
    }

    let buf = map(&path).expect("remap");
    let mut out = vec![0u8; payload.len()];
    buf.read_into(100, &mut out).expect("read_into");
    assert_eq!(out, payload);
    assert_eq!(&fs::read(&path).expect("read")[100..300], &payload[..]);

    let _ = fs::remove_file(&path);
}

#[test]
fn missing_file_is_not_found_and_not_created() {
    let path = tmp_path("missing_file");
    let _ = fs::remove_file(&path);

    let err = map(&path).unwrap_err();
    assert!(err.is_not_found(), "{err}");
    assert!(!err.is_invalid_argument());
    assert!(!path.exists());

    let err = map_len(&path, 64_u64).unwrap_err();
    assert!(err.is_not_found(), "{err}");
    assert!(!path.exists());
}

#[test]
fn invalid_paths_fail_before_filesystem_access() {
    let err = map("").unwrap_err();
    assert!(matches!(err, MapError::InvalidArgument(_)));

    let err = MapRequest::builder().len(16_u64).build().unwrap_err();
    assert_eq!(err.to_string(), "invalid argument: path is required");
}

#[test]
fn out_of_bounds_access() {
    let path = tmp_path("out_of_bounds");
    fs::write(&path, [1u8; 1024]).expect("seed");

    let mut buf = map(&path).expect("map");
    let mut out = [0u8; 10];
    let err = buf.read_into(2048, &mut out).unwrap_err();
    assert_eq!(
        err.to_string(),
        "range out of bounds: offset=2048, len=10, total=1024"
    );
    assert!(buf.update_region(1020, b"too long").is_err());
    assert!(buf.flush_range(0, 1025).is_err());
    buf.flush_range(0, 1024).expect("flush range");

    drop(buf);
    let _ = fs::remove_file(&path);
}

#[test]
fn request_returns_raw_buffer_by_default() {
    let path = tmp_path("request_raw");
    fs::write(&path, [2u8; 64]).expect("seed");

    let request = MapRequest::builder().path(&path).build().expect("request");
    let mapped = map_request(&request).expect("map");
    assert_eq!(mapped.byte_len(), 64);
    assert_eq!(mapped.element_count(), 64);
    assert!(matches!(mapped, Mapped::Buffer(_)));

    drop(mapped);
    let _ = fs::remove_file(&path);
}

#[test]
fn directories_cannot_be_mapped() {
    let dir = tempfile::tempdir().expect("tempdir");
    let err = map(dir.path()).unwrap_err();
    assert!(!err.is_invalid_argument());
    assert!(err.io_kind().is_some(), "{err}");
}

/// Cap the process file size so growing past `limit` fails with EFBIG on any filesystem.
#[cfg(target_os = "linux")]
fn cap_file_size(limit: u64) {
    // SAFETY: plain libc calls on process-wide settings; SIGXFSZ is ignored so
    // the oversized ftruncate reports EFBIG instead of killing the test binary.
    unsafe {
        libc::signal(libc::SIGXFSZ, libc::SIG_IGN);
        let mut current = libc::rlimit {
            rlim_cur: 0,
            rlim_max: 0,
        };
        if libc::getrlimit(libc::RLIMIT_FSIZE, &mut current) == 0
            && current.rlim_cur > limit as libc::rlim_t
        {
            let capped = libc::rlimit {
                rlim_cur: limit as libc::rlim_t,
                rlim_max: current.rlim_max,
            };
            libc::setrlimit(libc::RLIMIT_FSIZE, &capped);
        }
    }
}

#[cfg(target_os = "linux")]
#[test]
fn failed_extension_keeps_prior_size() {
    cap_file_size(1 << 40);
    let path = tmp_path("efbig");
    fs::write(&path, [5u8; 100]).expect("seed");

    let err = map_len(&path, 1_u64 << 41).unwrap_err();
    assert!(!err.is_invalid_argument(), "{err}");
    assert!(
        matches!(err, MapError::Io { op: "extend", .. }),
        "{err}"
    );
    let bytes = fs::read(&path).expect("read");
    assert_eq!(bytes.len(), 100);
    assert!(bytes.iter().all(|&b| b == 5));

    let _ = fs::remove_file(&path);
}
