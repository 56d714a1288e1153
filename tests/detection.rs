//! Integration tests for format detection and the capability gate.
//!
//! Packages are written with `zip::ZipWriter` into temporary directories. Manifests are
//! stored as plain text XML, which readers accept alongside binary XML.

use apkscope::{
    android::Runtime, detect, detect_with_options, Capabilities, DetectedFormat, Error,
    ReaderOptions,
};
use std::{
    io::Write,
    path::{Path, PathBuf},
};
use tempfile::TempDir;
use zip::{write::SimpleFileOptions, ZipWriter};

const MANIFEST: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<manifest xmlns:android="http://schemas.android.com/apk/res/android" package="com.companyname.hello" android:versionCode="1" android:versionName="1.0">
  <uses-sdk android:minSdkVersion="21" android:targetSdkVersion="35" />
  <uses-permission android:name="android.permission.INTERNET" />
  <uses-permission android:name="android.permission.ACCESS_NETWORK_STATE" />
  <application android:label="hello" android:name="crc6488302ad6e9e4df1a.MainApplication">
    <activity android:name="crc6488302ad6e9e4df1a.MainActivity" android:exported="true">
      <intent-filter>
        <action android:name="android.intent.action.MAIN" />
        <category android:name="android.intent.category.LAUNCHER" />
      </intent-filter>
    </activity>
  </application>
</manifest>
"#;

fn write_zip(dir: &TempDir, name: &str, entries: &[(&str, &[u8])]) -> PathBuf {
    let path = dir.path().join(name);
    let mut writer = ZipWriter::new(std::fs::File::create(&path).unwrap());
    for (name, data) in entries {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap();
    path
}

fn write_file(dir: &TempDir, name: &str, data: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, data).unwrap();
    path
}

/// A version 1 store with `local` empty descriptors and, in the shared store, `global`
/// rows in each hash index.
fn store_bytes(store_id: u32, local: u32, global: u32) -> Vec<u8> {
    let mut data = b"XABA".to_vec();
    for value in [1u32, local, global, store_id] {
        data.extend_from_slice(&value.to_le_bytes());
    }
    data.resize(data.len() + local as usize * 24, 0);
    if store_id == 0 {
        data.resize(data.len() + 2 * global as usize * 20, 0);
    }
    data
}

fn format_of(path: &Path) -> DetectedFormat {
    detect(path).unwrap().format()
}

#[test]
fn apk_is_detected() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_zip(
        &dir,
        "com.companyname.hello-Signed.apk",
        &[
            ("AndroidManifest.xml", MANIFEST.as_bytes()),
            ("classes.dex", b"dex\n035\0"),
            ("lib/arm64-v8a/libcoreclr.so", b"\x7fELF"),
            ("lib/x86_64/libcoreclr.so", b"\x7fELF"),
        ],
    );

    let detection = detect(&path).unwrap();
    assert_eq!(detection.format(), DetectedFormat::Apk);

    let reader = detection.reader().unwrap();
    assert_eq!(reader.path(), path.as_path());
    assert_eq!(
        reader.capabilities(),
        Capabilities::APP_INFO | Capabilities::XAMARIN_APP | Capabilities::TYPEMAPS
    );

    let info = reader.app_info().unwrap();
    assert_eq!(info.package.as_deref(), Some("com.companyname.hello"));
    assert_eq!(info.version_name.as_deref(), Some("1.0"));
    assert_eq!(info.min_sdk_version, Some(21));
    assert_eq!(info.target_sdk_version, Some(35));
    assert_eq!(
        info.permissions,
        vec![
            "android.permission.ACCESS_NETWORK_STATE",
            "android.permission.INTERNET"
        ]
    );
    assert_eq!(
        info.main_activity.as_deref(),
        Some("crc6488302ad6e9e4df1a.MainActivity")
    );
    assert_eq!(info.runtime, Some(Runtime::CoreClr));
    assert_eq!(info.abis, vec!["arm64-v8a", "x86_64"]);

    let manifest = reader.manifest().unwrap();
    assert_eq!(manifest.root().unwrap().name, "manifest");

    assert!(matches!(
        reader.xamarin_app(),
        Err(Error::EntryNotFound(_))
    ));
}

#[test]
fn aab_is_detected() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_zip(
        &dir,
        "hello.aab",
        &[
            ("BundleConfig.pb", b"\x0a\x05\x0a\x031.0"),
            ("base/manifest/AndroidManifest.xml", b"\x0a\x08manifest"),
            ("base/dex/classes.dex", b"dex\n035\0"),
        ],
    );

    let detection = detect(&path).unwrap();
    assert_eq!(detection.format(), DetectedFormat::Aab);

    let reader = detection.reader().unwrap();
    assert!(!reader.supports(Capabilities::APP_INFO));
    assert!(matches!(
        reader.app_info(),
        Err(Error::NotSupported {
            capability: "app info",
            format: "AAB"
        })
    ));
    assert!(matches!(
        reader.xamarin_app(),
        Err(Error::EntryNotFound(_))
    ));
}

#[test]
fn apk_and_aab_never_both() {
    let dir = tempfile::tempdir().unwrap();

    let only_manifest = write_zip(&dir, "a.zip", &[("AndroidManifest.xml", MANIFEST.as_bytes())]);
    assert_eq!(format_of(&only_manifest), DetectedFormat::Apk);

    let bundle_and_manifest = write_zip(
        &dir,
        "b.zip",
        &[
            ("AndroidManifest.xml", MANIFEST.as_bytes()),
            ("base/manifest/AndroidManifest.xml", b""),
            ("BundleConfig.pb", b""),
        ],
    );
    assert_eq!(format_of(&bundle_and_manifest), DetectedFormat::Aab);

    // a bundle manifest without BundleConfig.pb is neither
    let half_bundle = write_zip(&dir, "c.zip", &[("base/manifest/AndroidManifest.xml", b"")]);
    assert_eq!(format_of(&half_bundle), DetectedFormat::Unknown);
}

#[test]
fn entry_case_follows_options() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_zip(&dir, "odd.apk", &[("androidmanifest.xml", MANIFEST.as_bytes())]);

    assert_eq!(format_of(&path), DetectedFormat::Unknown);

    let options = ReaderOptions::default().with_case_sensitive(false);
    let detection = detect_with_options(&path, options).unwrap();
    assert_eq!(detection.format(), DetectedFormat::Apk);
    let info = detection.reader().unwrap().app_info().unwrap();
    assert_eq!(info.package.as_deref(), Some("com.companyname.hello"));
}

#[test]
fn assembly_stores_are_detected() {
    let dir = tempfile::tempdir().unwrap();

    let shared = write_file(&dir, "assemblies.blob", &store_bytes(0, 12, 40));
    let detection = detect(&shared).unwrap();
    assert_eq!(detection.format(), DetectedFormat::AssemblyStore);
    let shared = detection.reader().unwrap().assembly_store().unwrap();
    assert!(!shared.header().is_arch_specific());
    assert!(shared.header().has_global_index());
    assert_eq!(shared.arch(), None);
    assert_eq!(shared.assemblies().len(), 12);
    assert_eq!(shared.global_index32().len(), 40);
    assert_eq!(shared.global_index64().len(), 40);

    let arm64 = write_file(&dir, "assemblies.arm64-v8a.blob", &store_bytes(3, 12, 40));
    let store = detect(&arm64)
        .unwrap()
        .into_reader()
        .unwrap()
        .assembly_store()
        .unwrap();
    assert!(store.header().is_arch_specific());
    assert_eq!(store.arch(), Some("arm64-v8a"));
    assert_eq!(store.header().local_entry_count, 12);
    assert!(store.global_index64().is_empty());

    // the index of the shared store is cut short
    let mut truncated = store_bytes(0, 1, 8);
    truncated.truncate(truncated.len() - 20);
    let path = write_file(&dir, "assemblies.truncated.blob", &truncated);
    let error = detect(&path)
        .unwrap()
        .reader()
        .unwrap()
        .assembly_store()
        .unwrap_err();
    assert!(matches!(error, Error::InvalidData { .. }));
}

#[test]
fn bad_store_version_is_a_format_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut data = store_bytes(1, 0, 0);
    data[4] = 7;
    let path = write_file(&dir, "assemblies.x86.blob", &data);

    // detection only looks at the magic
    let detection = detect(&path).unwrap();
    assert_eq!(detection.format(), DetectedFormat::AssemblyStore);
    let error = detection.reader().unwrap().assembly_store().unwrap_err();
    assert!(matches!(error, Error::InvalidData { offset: 4, .. }));
    assert!(!error.is_capability_error());
}

#[test]
fn unsupported_facets_fail_without_io() {
    let dir = tempfile::tempdir().unwrap();
    let apk = write_zip(&dir, "app.apk", &[("AndroidManifest.xml", MANIFEST.as_bytes())]);
    let store = write_file(&dir, "assemblies.x86_64.blob", &store_bytes(1, 2, 0));

    let apk_reader = detect(&apk).unwrap().into_reader().unwrap();
    let store_reader = detect(&store).unwrap().into_reader().unwrap();
    std::fs::remove_file(&apk).unwrap();
    std::fs::remove_file(&store).unwrap();

    assert!(matches!(
        apk_reader.assembly_store(),
        Err(Error::NotSupported {
            capability: "assembly store",
            format: "APK"
        })
    ));
    assert!(matches!(
        store_reader.typemaps(),
        Err(Error::NotSupported {
            capability: "type maps",
            format: "assembly store"
        })
    ));
    assert!(store_reader.app_info().unwrap_err().is_capability_error());

    // supported facets do need the file
    assert!(matches!(apk_reader.app_info(), Err(Error::FileError(_))));
    assert!(matches!(
        store_reader.assembly_store(),
        Err(Error::FileError(_))
    ));
}

#[test]
fn unknown_inputs_are_not_errors() {
    let dir = tempfile::tempdir().unwrap();

    let text = write_file(&dir, "notes.txt", b"just some text");
    assert_eq!(format_of(&text), DetectedFormat::Unknown);

    let empty = write_file(&dir, "empty.bin", b"");
    assert_eq!(format_of(&empty), DetectedFormat::Unknown);

    let not_a_zip = write_file(&dir, "broken.apk", b"PK\x03\x04\x14\x00");
    let detection = detect(&not_a_zip).unwrap();
    assert_eq!(detection.format(), DetectedFormat::Unknown);
    assert!(detection.reader().is_none());

    let elf_executable = {
        let mut data = vec![0x7f, b'E', b'L', b'F', 2, 1, 1, 0];
        data.resize(16, 0);
        data.extend_from_slice(&2u16.to_le_bytes());
        data.resize(64, 0);
        write_file(&dir, "app_process", &data)
    };
    assert_eq!(format_of(&elf_executable), DetectedFormat::Unknown);

    assert_eq!(format_of(dir.path()), DetectedFormat::Unknown);
}

#[test]
fn elf_libraries_resolve_before_decoding() {
    let dir = tempfile::tempdir().unwrap();
    // no section headers, so there is no payload to find and nothing to decode
    let mut data = vec![0x7f, b'E', b'L', b'F', 2, 1, 1, 0];
    data.resize(16, 0);
    data.extend_from_slice(&3u16.to_le_bytes());
    data.resize(64, 0);
    let path = write_file(&dir, "libfoo.so", &data);

    let detection = detect(&path).unwrap();
    assert_eq!(detection.format(), DetectedFormat::ElfSharedLibrary);
    let reader = detection.reader().unwrap();
    assert!(reader.supports(Capabilities::XAMARIN_APP | Capabilities::TYPEMAPS));
    let error = reader.xamarin_app().unwrap_err();
    assert!(!error.is_capability_error());
}

#[test]
fn aab_base_modules_are_detected() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_zip(
        &dir,
        "base.zip",
        &[
            ("manifest/AndroidManifest.xml", b"\x0a\x15"),
            ("dex/classes.dex", b"dex\n035\0"),
            ("lib/arm64-v8a/libmonosgen-2.0.so", b"\x7fELF"),
        ],
    );

    let detection = detect(&path).unwrap();
    assert_eq!(detection.format(), DetectedFormat::AabBase);
    assert_eq!(detection.format().name(), "AAB base module");
    let reader = detection.reader().unwrap();
    assert!(!reader.supports(Capabilities::APP_INFO));
    assert!(matches!(
        reader.xamarin_app(),
        Err(Error::EntryNotFound(_))
    ));

    // whole bundles keep their own format
    let bundle = write_zip(
        &dir,
        "app.aab",
        &[
            ("base/manifest/AndroidManifest.xml", b""),
            ("BundleConfig.pb", b""),
            ("manifest/AndroidManifest.xml", b""),
        ],
    );
    assert_eq!(format_of(&bundle), DetectedFormat::Aab);
}

#[test]
fn missing_input_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        detect(&dir.path().join("nothing.apk")),
        Err(Error::FileError(_))
    ));
}
