//! Platform primitives: shared-memory segments and the concrete mapping engines.

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        pub(crate) mod unix;
        pub use self::unix::PosixEngine;
    } else if #[cfg(windows)] {
        pub(crate) mod windows;
        pub use self::windows::WindowsEngine;
    } else {
        compile_error!("mmap-view supports unix and windows targets only");
    }
}
