use crate::{
    axml::{XmlDocument, XmlElement},
    Result,
};

use super::{package_abis, Runtime};

const MAIN_ACTION: &str = "android.intent.action.MAIN";
const LAUNCHER_CATEGORY: &str = "android.intent.category.LAUNCHER";

/// Launcher activity injected by fast deployment builds; never reported as the main activity.
pub const FASTDEV_LAUNCHER: &str = "mono.android.__FastDevLauncher";

/// What the manifest and the package layout say about an application.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppInfo {
    /// `package` attribute of `<manifest>`
    pub package: Option<String>,
    /// `android:versionCode`
    pub version_code: Option<String>,
    /// `android:versionName`
    pub version_name: Option<String>,
    /// `android:minSdkVersion` of `<uses-sdk>`
    pub min_sdk_version: Option<u32>,
    /// `android:targetSdkVersion` of `<uses-sdk>`
    pub target_sdk_version: Option<u32>,
    /// `android:name` of every `<uses-permission>`, sorted and deduplicated
    pub permissions: Vec<String>,
    /// Fully qualified name of the launcher activity
    pub main_activity: Option<String>,
    /// Managed runtime found among the native libraries
    pub runtime: Option<Runtime>,
    /// ABIs with native libraries, sorted
    pub abis: Vec<String>,
}

impl AppInfo {
    /// Collects the manifest facts from a decoded `AndroidManifest.xml`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the document root is not `<manifest>`.
    pub fn from_document(document: &XmlDocument) -> Result<AppInfo> {
        let Some(manifest) = document.root() else {
            return Err(malformed_error!("Manifest document has no root element"));
        };
        if manifest.name != "manifest" {
            return Err(malformed_error!(
                "Manifest root is <{}>, expected <manifest>",
                manifest.name
            ));
        }

        let package = manifest.attribute("package").map(str::to_string);

        let (min_sdk_version, target_sdk_version) = match manifest.child("uses-sdk") {
            Some(uses_sdk) => (
                sdk_version(uses_sdk, "minSdkVersion"),
                sdk_version(uses_sdk, "targetSdkVersion"),
            ),
            None => (None, None),
        };

        let mut permissions: Vec<String> = manifest
            .children_named("uses-permission")
            .filter_map(|element| element.android_attribute("name"))
            .map(str::to_string)
            .collect();
        permissions.sort();
        permissions.dedup();

        let main_activity = manifest
            .child("application")
            .and_then(launcher_activity)
            .map(|name| qualify_class(package.as_deref(), name));

        Ok(AppInfo {
            version_code: manifest.android_attribute("versionCode").map(str::to_string),
            version_name: manifest.android_attribute("versionName").map(str::to_string),
            package,
            min_sdk_version,
            target_sdk_version,
            permissions,
            main_activity,
            runtime: None,
            abis: Vec::new(),
        })
    }

    /// Fills [`AppInfo::runtime`] and [`AppInfo::abis`] from the package entry names.
    #[must_use]
    pub fn with_entries<'a, I>(mut self, entries: I) -> AppInfo
    where
        I: IntoIterator<Item = &'a str> + Clone,
    {
        self.runtime = Runtime::detect(entries.clone());
        self.abis = package_abis(entries);
        self
    }
}

fn sdk_version(uses_sdk: &XmlElement, name: &str) -> Option<u32> {
    let value = uses_sdk.android_attribute(name)?;
    let parsed = match value.strip_prefix("0x") {
        Some(hex) => u32::from_str_radix(hex, 16).ok(),
        None => value.parse().ok(),
    };
    if parsed.is_none() {
        log::warn!("Ignoring non-numeric {name} '{value}'");
    }
    parsed
}

fn is_launcher(component: &XmlElement) -> bool {
    component.children_named("intent-filter").any(|filter| {
        let has_action = filter
            .children_named("action")
            .any(|action| action.android_attribute("name") == Some(MAIN_ACTION));
        let has_category = filter
            .children_named("category")
            .any(|category| category.android_attribute("name") == Some(LAUNCHER_CATEGORY));
        has_action && has_category
    })
}

fn launcher_activity(application: &XmlElement) -> Option<&str> {
    application
        .children
        .iter()
        .filter(|child| child.name == "activity" || child.name == "activity-alias")
        .filter(|child| is_launcher(child))
        .filter_map(|child| child.android_attribute("name"))
        .find(|name| !name.is_empty() && *name != FASTDEV_LAUNCHER)
}

/// `.Main` and `Main` are relative to the package.
fn qualify_class(package: Option<&str>, name: &str) -> String {
    match package {
        Some(package) if name.starts_with('.') => format!("{package}{name}"),
        Some(package) if !name.contains('.') => format!("{package}.{name}"),
        _ => name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        axml::{ValueType, ANDROID_NAMESPACE},
        test::axml::AxmlBuilder,
        Error,
    };

    const MANIFEST: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<manifest xmlns:android="http://schemas.android.com/apk/res/android" package="com.example.hello" android:versionCode="3" android:versionName="1.2">
  <uses-sdk android:minSdkVersion="21" android:targetSdkVersion="34"/>
  <uses-permission android:name="android.permission.INTERNET"/>
  <uses-permission android:name="android.permission.CAMERA"/>
  <uses-permission android:name="android.permission.INTERNET"/>
  <application android:label="Hello">
    <activity android:name="mono.android.__FastDevLauncher">
      <intent-filter>
        <action android:name="android.intent.action.MAIN"/>
        <category android:name="android.intent.category.LAUNCHER"/>
      </intent-filter>
    </activity>
    <activity android:name=".SettingsActivity">
      <intent-filter>
        <action android:name="android.intent.action.VIEW"/>
        <category android:name="android.intent.category.LAUNCHER"/>
      </intent-filter>
    </activity>
    <activity-alias android:name=".Launcher">
      <intent-filter>
        <action android:name="android.intent.action.MAIN"/>
        <category android:name="android.intent.category.LAUNCHER"/>
      </intent-filter>
    </activity-alias>
  </application>
</manifest>"#;

    #[test]
    fn text_manifest() {
        let document = XmlDocument::parse_text(MANIFEST).unwrap();
        let info = AppInfo::from_document(&document).unwrap();

        assert_eq!(info.package.as_deref(), Some("com.example.hello"));
        assert_eq!(info.version_code.as_deref(), Some("3"));
        assert_eq!(info.version_name.as_deref(), Some("1.2"));
        assert_eq!(info.min_sdk_version, Some(21));
        assert_eq!(info.target_sdk_version, Some(34));
        assert_eq!(
            info.permissions,
            vec!["android.permission.CAMERA", "android.permission.INTERNET"]
        );
        assert_eq!(
            info.main_activity.as_deref(),
            Some("com.example.hello.Launcher")
        );
        assert_eq!(info.runtime, None);
    }

    #[test]
    fn binary_manifest() {
        let data = AxmlBuilder::new(false)
            .start_namespace("android", ANDROID_NAMESPACE)
            .start_element("manifest")
            .string_attribute(None, "package", "com.example.bin")
            .start_element("uses-sdk")
            .typed_attribute(Some(ANDROID_NAMESPACE), "minSdkVersion", ValueType::IntDec, 24)
            .end_element("uses-sdk")
            .start_element("application")
            .start_element("activity")
            .string_attribute(Some(ANDROID_NAMESPACE), "name", "crc64abc.MainActivity")
            .start_element("intent-filter")
            .start_element("action")
            .string_attribute(Some(ANDROID_NAMESPACE), "name", MAIN_ACTION)
            .end_element("action")
            .start_element("category")
            .string_attribute(Some(ANDROID_NAMESPACE), "name", LAUNCHER_CATEGORY)
            .end_element("category")
            .end_element("intent-filter")
            .end_element("activity")
            .end_element("application")
            .end_element("manifest")
            .end_namespace("android", ANDROID_NAMESPACE)
            .build();

        let document = XmlDocument::from_bytes(&data).unwrap();
        let info = AppInfo::from_document(&document)
            .unwrap()
            .with_entries(["lib/arm64-v8a/libmonosgen-2.0.so", "lib/x86_64/libmonosgen-2.0.so"]);

        assert_eq!(info.package.as_deref(), Some("com.example.bin"));
        assert_eq!(info.min_sdk_version, Some(24));
        assert_eq!(info.target_sdk_version, None);
        assert!(info.permissions.is_empty());
        assert_eq!(info.main_activity.as_deref(), Some("crc64abc.MainActivity"));
        assert_eq!(info.runtime, Some(Runtime::MonoVm));
        assert_eq!(info.abis, vec!["arm64-v8a", "x86_64"]);
    }

    #[test]
    fn codename_sdk_is_ignored() {
        let document = XmlDocument::parse_text(
            r#"<manifest xmlns:android="http://schemas.android.com/apk/res/android"><uses-sdk android:minSdkVersion="0x15" android:targetSdkVersion="VanillaIceCream"/></manifest>"#,
        )
        .unwrap();
        let info = AppInfo::from_document(&document).unwrap();
        assert_eq!(info.min_sdk_version, Some(21));
        assert_eq!(info.target_sdk_version, None);
        assert_eq!(info.package, None);
        assert_eq!(info.main_activity, None);
    }

    #[test]
    fn wrong_root() {
        let document = XmlDocument::parse_text("<resources/>").unwrap();
        assert!(matches!(
            AppInfo::from_document(&document),
            Err(Error::Malformed { .. })
        ));
        assert!(AppInfo::from_document(&XmlDocument::default()).is_err());
    }

    #[test]
    fn relative_class_names() {
        assert_eq!(qualify_class(Some("a.b"), ".Main"), "a.b.Main");
        assert_eq!(qualify_class(Some("a.b"), "Main"), "a.b.Main");
        assert_eq!(qualify_class(Some("a.b"), "c.d.Main"), "c.d.Main");
        assert_eq!(qualify_class(None, ".Main"), ".Main");
    }
}
