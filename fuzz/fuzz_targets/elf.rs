#![no_main]

use apkscope::native::XamarinApp;
use libfuzzer_sys::fuzz_target;
use std::path::Path;

fuzz_target!(|data: &[u8]| {
    if let Ok(app) = XamarinApp::from_mem(data.to_vec(), Path::new("libxamarin-app.so")) {
        let _ = app.application_config();
        let _ = app.dso_cache();
        let _ = app.marshal_method_names();
        let _ = app.typemaps();
    }
});
