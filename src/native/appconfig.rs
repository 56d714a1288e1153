//! The `application_config` struct and the `format_tag` that selects its layout.

use bitflags::bitflags;

use crate::{
    elf::SymbolAccessor,
    native::layout::{FieldKind, StringSlot, StructLayout, StructReader},
    Error, Result,
};

/// Symbol holding the generator format tag.
pub const FORMAT_TAG_SYMBOL: &str = "format_tag";
/// Symbol holding the [`ApplicationConfigV2`] struct.
pub const APPLICATION_CONFIG_SYMBOL: &str = "application_config";
/// Symbol only the CoreCLR generator emits.
///
/// That generator writes [`FORMAT_TAG_V2`] too, over a different 19 field struct.
pub const CORECLR_RUNTIME_PROPERTIES_SYMBOL: &str = "runtime_properties";

/// Tag of the first generator; its struct layout is not stable enough to decode.
pub const FORMAT_TAG_V1: u64 = 0x0001_5E69_7261_6D58;
/// Tag of the second generator.
pub const FORMAT_TAG_V2: u64 = 0x0002_5E69_7261_6D58;
/// Tag written by later generators that kept the V2 layout.
pub const FORMAT_TAG_V3: u64 = 0x0003_5E69_7261_6D58;

bitflags! {
    /// Optional Mono runtime components enabled for the application.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MonoComponents: u32 {
        /// The debugger agent
        const DEBUGGER = 0x01;
        /// Hot reload support
        const HOT_RELOAD = 0x02;
        /// EventPipe and diagnostics tracing
        const TRACING = 0x04;
    }
}

/// Generator version of a `libxamarin-app.so`, derived from its format tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatVersion {
    /// `FORMAT_TAG_V1`
    V1,
    /// `FORMAT_TAG_V2` or `FORMAT_TAG_V3`
    V2,
}

impl FormatVersion {
    /// Maps a raw tag to a version.
    ///
    /// # Errors
    /// Returns [`crate::Error::UnsupportedFormatTag`] for any unknown tag.
    pub fn from_tag(tag: u64) -> Result<Self> {
        match tag {
            FORMAT_TAG_V1 => Ok(FormatVersion::V1),
            FORMAT_TAG_V2 | FORMAT_TAG_V3 => Ok(FormatVersion::V2),
            other => Err(Error::UnsupportedFormatTag(other)),
        }
    }

    /// Reads `format_tag` from `image` and maps it.
    ///
    /// # Errors
    /// Fails if the symbol is missing, too short or carries an unknown tag.
    pub fn read(image: &impl SymbolAccessor) -> Result<Self> {
        Self::from_tag(image.read_u64(FORMAT_TAG_SYMBOL)?)
    }
}

/// The decoded `application_config`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplicationConfig {
    /// Produced by the first generator; only its existence is known
    V1,
    /// Produced by the second generator
    V2(ApplicationConfigV2),
}

impl ApplicationConfig {
    /// Reads the config matching the image's format tag.
    ///
    /// # Errors
    /// Returns [`crate::Error::UnsupportedFormatTag`] for unknown tags, and symbol or
    /// truncation errors from the V2 decoder.
    pub fn read(image: &impl SymbolAccessor) -> Result<Self> {
        match FormatVersion::read(image)? {
            FormatVersion::V1 => Ok(ApplicationConfig::V1),
            FormatVersion::V2 => Ok(ApplicationConfig::V2(ApplicationConfigV2::read(image)?)),
        }
    }

    /// The V2 payload, if any.
    #[must_use]
    pub fn as_v2(&self) -> Option<&ApplicationConfigV2> {
        match self {
            ApplicationConfig::V1 => None,
            ApplicationConfig::V2(config) => Some(config),
        }
    }
}

/// Build-time settings baked into `libxamarin-app.so` by the second generator.
///
/// Field names follow the native struct.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationConfigV2 {
    /// LLVM was used for AOT compilation
    pub uses_mono_llvm: bool,
    /// Assemblies were AOT compiled
    pub uses_mono_aot: bool,
    /// AOT images are loaded lazily
    pub aot_lazy_load: bool,
    /// All assemblies are loaded at startup
    pub uses_assembly_preload: bool,
    /// Legacy exception propagation across JNI transitions
    pub broken_exception_transitions: bool,
    /// Fast deployment is active
    pub instant_run_enabled: bool,
    /// `[JniAddNativeMethodRegistration]` is used somewhere in the application
    pub jni_add_native_method_registration_attribute_present: bool,
    /// A runtime config blob is bundled
    pub have_runtime_config_blob: bool,
    /// Assemblies are packed into an assembly store
    pub have_assembly_store: bool,
    /// Marshal methods replace dynamic JNI registration
    pub marshal_methods_enabled: bool,
    /// Split configuration APKs are ignored
    pub ignore_split_configs: bool,
    /// Exception type raised for unhandled stream errors
    pub bound_exception_type: u8,
    /// Java package naming policy for generated types
    pub package_naming_policy: u32,
    /// Entries in `app_environment_variables`
    pub environment_variable_count: u32,
    /// Entries in `app_system_properties`
    pub system_property_count: u32,
    /// Assemblies packaged in the APK
    pub number_of_assemblies_in_apk: u32,
    /// Width of the bundled assembly name buffers
    pub bundled_assembly_name_width: u32,
    /// Rows of `dso_cache`
    pub number_of_dso_cache_entries: u32,
    /// Rows of `aot_dso_cache`
    pub number_of_aot_cache_entries: u32,
    /// Shared libraries bundled with the application
    pub number_of_shared_libraries: u32,
    /// Metadata token of `Android.Runtime.JNIEnv`
    pub android_runtime_jnienv_class_token: u32,
    /// Metadata token of `JNIEnv.Initialize`
    pub jnienv_initialize_method_token: u32,
    /// Metadata token of `JNIEnv.RegisterJniNatives`
    pub jnienv_registerjninatives_method_token: u32,
    /// Entries in the JNI type remapping table
    pub jni_remapping_replacement_type_count: u32,
    /// Entries in the JNI method remapping index
    pub jni_remapping_replacement_method_index_entry_count: u32,
    /// Raw mask, see [`ApplicationConfigV2::mono_components`]
    pub mono_components_mask: u32,
    /// `None` when the pointer is null or cannot be resolved
    pub android_package_name: Option<String>,
}

impl ApplicationConfigV2 {
    /// Field layout of the native struct.
    pub const LAYOUT: StructLayout = StructLayout::new(&[
        FieldKind::Bool,
        FieldKind::Bool,
        FieldKind::Bool,
        FieldKind::Bool,
        FieldKind::Bool,
        FieldKind::Bool,
        FieldKind::Bool,
        FieldKind::Bool,
        FieldKind::Bool,
        FieldKind::Bool,
        FieldKind::Bool,
        FieldKind::U8,
        FieldKind::U32,
        FieldKind::U32,
        FieldKind::U32,
        FieldKind::U32,
        FieldKind::U32,
        FieldKind::U32,
        FieldKind::U32,
        FieldKind::U32,
        FieldKind::U32,
        FieldKind::U32,
        FieldKind::U32,
        FieldKind::U32,
        FieldKind::U32,
        FieldKind::U32,
        FieldKind::String,
    ]);

    /// Decodes `application_config` from `image`, ignoring the format tag.
    ///
    /// # Errors
    /// Returns [`crate::Error::SymbolNotFound`] or [`crate::Error::TruncatedStruct`], and
    /// [`crate::Error::NotImplemented`] for libraries built for CoreCLR.
    pub fn read(image: &impl SymbolAccessor) -> Result<Self> {
        if image.has_symbol(CORECLR_RUNTIME_PROPERTIES_SYMBOL) {
            return Err(Error::NotImplemented("CoreCLR application_config layout"));
        }

        let symbol = image.require_symbol(APPLICATION_CONFIG_SYMBOL)?;
        let data = image.symbol_bytes(symbol)?;
        let mut reader = StructReader::new(data, 0, &Self::LAYOUT, image.is_64bit())?;

        let uses_mono_llvm = reader.read()?;
        let uses_mono_aot = reader.read()?;
        let aot_lazy_load = reader.read()?;
        let uses_assembly_preload = reader.read()?;
        let broken_exception_transitions = reader.read()?;
        let instant_run_enabled = reader.read()?;
        let jni_add_native_method_registration_attribute_present = reader.read()?;
        let have_runtime_config_blob = reader.read()?;
        let have_assembly_store = reader.read()?;
        let marshal_methods_enabled = reader.read()?;
        let ignore_split_configs = reader.read()?;
        let bound_exception_type = reader.read()?;
        let package_naming_policy = reader.read()?;
        let environment_variable_count = reader.read()?;
        let system_property_count = reader.read()?;
        let number_of_assemblies_in_apk = reader.read()?;
        let bundled_assembly_name_width = reader.read()?;
        let number_of_dso_cache_entries = reader.read()?;
        let number_of_aot_cache_entries = reader.read()?;
        let number_of_shared_libraries = reader.read()?;
        let android_runtime_jnienv_class_token = reader.read()?;
        let jnienv_initialize_method_token = reader.read()?;
        let jnienv_registerjninatives_method_token = reader.read()?;
        let jni_remapping_replacement_type_count = reader.read()?;
        let jni_remapping_replacement_method_index_entry_count = reader.read()?;
        let mono_components_mask = reader.read()?;
        let package_name: StringSlot = reader.read()?;

        Ok(ApplicationConfigV2 {
            uses_mono_llvm,
            uses_mono_aot,
            aot_lazy_load,
            uses_assembly_preload,
            broken_exception_transitions,
            instant_run_enabled,
            jni_add_native_method_registration_attribute_present,
            have_runtime_config_blob,
            have_assembly_store,
            marshal_methods_enabled,
            ignore_split_configs,
            bound_exception_type,
            package_naming_policy,
            environment_variable_count,
            system_property_count,
            number_of_assemblies_in_apk,
            bundled_assembly_name_width,
            number_of_dso_cache_entries,
            number_of_aot_cache_entries,
            number_of_shared_libraries,
            android_runtime_jnienv_class_token,
            jnienv_initialize_method_token,
            jnienv_registerjninatives_method_token,
            jni_remapping_replacement_type_count,
            jni_remapping_replacement_method_index_entry_count,
            mono_components_mask,
            android_package_name: image.string_from_pointer_field(symbol, package_name.offset)?,
        })
    }

    /// Known bits of `mono_components_mask`; unknown bits are dropped.
    #[must_use]
    pub fn mono_components(&self) -> MonoComponents {
        MonoComponents::from_bits_truncate(self.mono_components_mask)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::elf::{ElfBuilder, StructBytes};

    fn config_bytes(is_64bit: bool, package: u64) -> StructBytes {
        let mut bytes = StructBytes::new(is_64bit);
        // uses_mono_aot, have_assembly_store and marshal_methods_enabled set
        for flag in [0, 1, 0, 0, 0, 0, 0, 0, 1, 1, 0] {
            bytes = bytes.bool(flag == 1);
        }
        bytes = bytes.u8(2);
        for value in 1..=13u32 {
            bytes = bytes.u32(value * 10);
        }
        bytes.u32(0x5).pointer(package).end_row()
    }

    #[test]
    fn layout_sizes() {
        assert_eq!(ApplicationConfigV2::LAYOUT.fields_end(true), 80);
        assert_eq!(ApplicationConfigV2::LAYOUT.fields_end(false), 72);
        assert_eq!(ApplicationConfigV2::LAYOUT.offsets(true)[26], 72);
        assert_eq!(ApplicationConfigV2::LAYOUT.offsets(false)[26], 68);
    }

    #[test]
    fn format_tags() {
        assert_eq!(
            FormatVersion::from_tag(FORMAT_TAG_V1).unwrap(),
            FormatVersion::V1
        );
        assert_eq!(
            FormatVersion::from_tag(FORMAT_TAG_V2).unwrap(),
            FormatVersion::V2
        );
        assert_eq!(
            FormatVersion::from_tag(FORMAT_TAG_V3).unwrap(),
            FormatVersion::V2
        );
        assert!(matches!(
            FormatVersion::from_tag(0x0004_5E69_7261_6D58),
            Err(Error::UnsupportedFormatTag(0x0004_5E69_7261_6D58))
        ));
    }

    #[test]
    fn decode_v2() {
        for is_64bit in [false, true] {
            let mut builder = ElfBuilder::new(is_64bit);
            let package = builder.rodata_string("com.example.hello");
            builder.symbol(FORMAT_TAG_SYMBOL, StructBytes::new(is_64bit).u64(FORMAT_TAG_V3));
            builder.symbol(APPLICATION_CONFIG_SYMBOL, config_bytes(is_64bit, package));
            let image = builder.build_image();

            let config = ApplicationConfig::read(&image).unwrap();
            let v2 = config.as_v2().unwrap();
            assert!(!v2.uses_mono_llvm);
            assert!(v2.uses_mono_aot);
            assert!(v2.have_assembly_store);
            assert!(v2.marshal_methods_enabled);
            assert!(!v2.ignore_split_configs);
            assert_eq!(v2.bound_exception_type, 2);
            assert_eq!(v2.package_naming_policy, 10);
            assert_eq!(v2.number_of_dso_cache_entries, 60);
            assert_eq!(v2.jni_remapping_replacement_method_index_entry_count, 130);
            assert_eq!(
                v2.mono_components(),
                MonoComponents::DEBUGGER | MonoComponents::TRACING
            );
            assert_eq!(v2.android_package_name.as_deref(), Some("com.example.hello"));
        }
    }

    #[test]
    fn v1_has_no_fields() {
        let mut builder = ElfBuilder::new(true);
        builder.symbol(FORMAT_TAG_SYMBOL, StructBytes::new(true).u64(FORMAT_TAG_V1));
        let image = builder.build_image();

        let config = ApplicationConfig::read(&image).unwrap();
        assert_eq!(config, ApplicationConfig::V1);
        assert!(config.as_v2().is_none());
    }

    #[test]
    fn unknown_tag_is_not_decoded() {
        let mut builder = ElfBuilder::new(true);
        builder.symbol(FORMAT_TAG_SYMBOL, StructBytes::new(true).u64(0xDEAD_BEEF));
        builder.symbol(APPLICATION_CONFIG_SYMBOL, config_bytes(true, 0));
        let image = builder.build_image();

        assert!(matches!(
            ApplicationConfig::read(&image),
            Err(Error::UnsupportedFormatTag(0xDEAD_BEEF))
        ));
    }

    #[test]
    fn coreclr_config_is_not_decoded_as_mono() {
        let mut builder = ElfBuilder::new(true);
        builder.symbol(FORMAT_TAG_SYMBOL, StructBytes::new(true).u64(FORMAT_TAG_V2));
        builder.symbol(APPLICATION_CONFIG_SYMBOL, config_bytes(true, 0));
        builder.symbol(
            CORECLR_RUNTIME_PROPERTIES_SYMBOL,
            StructBytes::new(true).u64(0),
        );
        let image = builder.build_image();

        let error = ApplicationConfig::read(&image).unwrap_err();
        assert!(matches!(error, Error::NotImplemented(_)));
        assert!(error.is_capability_error());
    }

    #[test]
    fn truncated_config() {
        let mut builder = ElfBuilder::new(true);
        builder.symbol(FORMAT_TAG_SYMBOL, StructBytes::new(true).u64(FORMAT_TAG_V2));
        builder.symbol(APPLICATION_CONFIG_SYMBOL, StructBytes::new(true).raw(&[0; 40]));
        let image = builder.build_image();

        assert!(matches!(
            ApplicationConfig::read(&image),
            Err(Error::TruncatedStruct {
                needed: 80,
                available: 40
            })
        ));
    }
}
