// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(dead_code)]
//#![deny(unsafe_code)]
// - 'file/physical.rs' uses mmap to map a file into memory

//! # apkscope
//!
//! [![Crates.io](https://img.shields.io/crates/v/apkscope.svg)](https://crates.io/crates/apkscope)
//! [![Documentation](https://docs.rs/apkscope/badge.svg)](https://docs.rs/apkscope)
//! [![License](https://img.shields.io/badge/license-Apache--2.0-blue.svg)](https://github.com/BinFlip/apkscope/blob/main/LICENSE-APACHE)
//!
//! A read-only inspector for the native artifacts of .NET for Android applications. Given a
//! path, `apkscope` sniffs what the file is and hands back a reader exposing whatever that
//! kind of input can provide:
//!
//! - **Packages** (APK, AAB) - the manifest, application facts and the bundled
//!   `libxamarin-app.so`
//! - **`libxamarin-app.so`** - application config, DSO cache, marshal method tables,
//!   environment, type maps
//! - **Assembly stores** (`assemblies*.blob`) - the store header and its architecture
//!
//! Everything is decoded from bytes in pure Rust: ELF through `goblin`, packages through
//! `zip`, binary XML by a built-in decoder.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use apkscope::prelude::*;
//! use std::path::Path;
//!
//! let detection = detect(Path::new("app.apk"))?;
//! println!("Detected {}", detection.format());
//!
//! if let Some(reader) = detection.reader() {
//!     if reader.supports(Capabilities::APP_INFO) {
//!         let info = reader.app_info()?;
//!         println!("{:?} (min sdk {:?})", info.package, info.min_sdk_version);
//!     }
//!
//!     let app = reader.xamarin_app()?;
//!     if let ApplicationConfig::V2(config) = app.application_config()? {
//!         println!("{} assemblies", config.number_of_assemblies_in_apk);
//!     }
//! }
//! # Ok::<(), apkscope::Error>(())
//! ```
//!
//! ## Capabilities
//!
//! A reader only offers the facets its format can carry. Asking an APK for an assembly
//! store, for instance, fails with [`Error::NotSupported`] immediately, before the package
//! is opened. Everything else that fails is a format error describing what was wrong with
//! the bytes. See [`reader`] for the capability table.
//!
//! ## Logging
//!
//! Recoverable oddities (unbalanced XML, unknown chunks, odd-length tables) are reported
//! through the [`log`](https://docs.rs/log) facade and decoding carries on. Install any
//! logger to see them.

#[macro_use]
pub(crate) mod macros;

#[macro_use]
pub(crate) mod error;

/// Shared functionality which is used in unit- and integration-tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust,no_run
/// use apkscope::prelude::*;
///
/// let detection = detect("libxamarin-app.so".as_ref())?;
/// let maps = detection.reader().unwrap().typemaps()?;
/// # Ok::<(), apkscope::Error>(())
/// ```
pub mod prelude;

/// Byte sources and cursor readers.
pub mod file;

/// Shared library loading and symbol access.
pub mod elf;

/// Decoders for the tables generated into `libxamarin-app.so`.
pub mod native;

/// Android binary XML.
///
/// # Examples
///
/// ```rust,no_run
/// let data = std::fs::read("AndroidManifest.xml")?;
/// let document = apkscope::axml::parse(&data)?;
/// println!("{}", document.to_xml_string()?);
/// # Ok::<(), apkscope::Error>(())
/// ```
pub mod axml;

/// Assembly store headers.
pub mod assemblystore;

/// Manifest facts and runtime detection.
pub mod android;

/// Zip package access.
pub mod container;

/// Format detection.
pub mod detect;

/// Capability-gated readers.
pub mod reader;

/// `apkscope` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `apkscope` Error type
///
/// # Examples
///
/// ```rust,no_run
/// use apkscope::{native::XamarinApp, Error};
///
/// match XamarinApp::from_file(std::path::Path::new("libxamarin-app.so")) {
///     Ok(app) => println!("{:?}", app.format_version()),
///     Err(Error::UnsupportedFormatTag(tag)) => println!("unknown generator {tag:x}"),
///     Err(Error::SymbolNotFound(name)) => println!("not an app library, no {name}"),
///     Err(e) => println!("Error: {e}"),
/// }
/// ```
pub use error::Error;

pub use detect::{detect, detect_with_options, DetectedFormat, DetectionResult};
pub use file::parser::Parser;
pub use reader::{Capabilities, InputReader, ReaderOptions};
