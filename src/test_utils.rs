#![allow(dead_code)]

use std::{
    ops::Deref,
    path::PathBuf,
    sync::Once,
};

use log::Level;

// https://stackoverflow.com/a/40234666/9739737
#[macro_export]
macro_rules! current_func {
    () => {{
        fn f() {}
        fn type_name_of<T>(_: T) -> &'static str {
            std::any::type_name::<T>()
        }
        let name = type_name_of(f);
        name.strip_suffix("::f").unwrap()
    }};
}

pub struct TempFile {
    path: PathBuf,
    cleanup: bool,
}

impl TempFile {
    pub fn new(name: &str, cleanup: bool) -> Self {
        let path = std::env::temp_dir().join(name);
        Self { path, cleanup }
    }
}

impl Deref for TempFile {
    type Target = PathBuf;

    fn deref(&self) -> &Self::Target {
        &self.path
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        if self.cleanup {
            std::fs::remove_file(&self.path).unwrap();
        }
    }
}

static TEST_LOGGER_INIT: Once = Once::new();

pub fn ensure_logger_initialized() {
    TEST_LOGGER_INIT.call_once(|| {
        simple_logger::init_with_level(Level::Info).unwrap();
    });
}
