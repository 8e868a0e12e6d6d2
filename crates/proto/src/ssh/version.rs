//! SSH protocol version exchange (RFC 4253 Section 4.2).
//!
//! The SSH protocol begins with a version exchange where both client and server
//! send an identification string:
//!
//! ```text
//! SSH-protoversion-softwareversion SP comments CR LF
//! ```
//!
//! Example: `SSH-2.0-Halyard_0.1.0`
//!
//! The rendered strings (without CR LF) are the `V_C`/`V_S` inputs to the key
//! exchange hash, so both sides must retain them verbatim.
//!
//! # Security
//!
//! - Maximum line length: 255 characters (DoS prevention)
//! - Must start with "SSH-2.0-" or "SSH-1.99-"
//! - No null bytes allowed in version string
//!
//! # Example
//!
//! ```rust
//! use halyard_proto::ssh::version::Version;
//!
//! let version = Version::new("Halyard_0.1.0", None);
//! assert_eq!(version.to_string(), "SSH-2.0-Halyard_0.1.0");
//!
//! let parsed = Version::parse("SSH-2.0-OpenSSH_8.9").unwrap();
//! assert_eq!(parsed.software(), "OpenSSH_8.9");
//! ```

use halyard_platform::{HalyardError, HalyardResult};

/// Maximum length of SSH version string (RFC 4253 Section 4.2).
pub const MAX_VERSION_LENGTH: usize = 255;

/// SSH protocol version string.
///
/// Represents the SSH identification string exchanged at connection start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version {
    /// Protocol version (e.g., "2.0")
    proto_version: String,
    /// Software version (e.g., "Halyard_0.1.0")
    software_version: String,
    /// Optional comments
    comments: Option<String>,
}

impl Version {
    /// Creates a new SSH version string.
    ///
    /// # Arguments
    ///
    /// * `software` - Software version string (e.g., "Halyard_0.1.0")
    /// * `comments` - Optional comments
    ///
    /// # Returns
    ///
    /// A new `Version` with protocol version "2.0".
    ///
    /// # Example
    ///
    /// ```rust
    /// use halyard_proto::ssh::version::Version;
    ///
    /// let version = Version::new("Halyard_0.1.0", None);
    /// assert_eq!(version.to_string(), "SSH-2.0-Halyard_0.1.0");
    /// ```
    pub fn new(software: &str, comments: Option<&str>) -> Self {
        Self {
            proto_version: "2.0".to_string(),
            software_version: software.to_string(),
            comments: comments.map(String::from),
        }
    }

    /// Returns the default Halyard version string.
    ///
    /// # Example
    ///
    /// ```rust
    /// use halyard_proto::ssh::version::Version;
    ///
    /// let version = Version::default_halyard();
    /// assert!(version.to_string().starts_with("SSH-2.0-Halyard_"));
    /// ```
    pub fn default_halyard() -> Self {
        Self::new(&format!("Halyard_{}", env!("CARGO_PKG_VERSION")), None)
    }

    /// Parses an SSH version string.
    ///
    /// # Arguments
    ///
    /// * `line` - The version string line (with or without CR LF)
    ///
    /// # Errors
    ///
    /// Returns [`HalyardError::Protocol`] if:
    /// - Line is too long (> 255 characters)
    /// - Line doesn't start with "SSH-"
    /// - Protocol version is not "2.0" or "1.99"
    /// - Line contains null bytes
    ///
    /// # Example
    ///
    /// ```rust
    /// use halyard_proto::ssh::version::Version;
    ///
    /// let version = Version::parse("SSH-2.0-OpenSSH_8.9\r\n").unwrap();
    /// assert_eq!(version.software(), "OpenSSH_8.9");
    /// ```
    pub fn parse(line: &str) -> HalyardResult<Self> {
        let line = line.trim_end_matches("\r\n").trim_end_matches('\n');

        if line.len() > MAX_VERSION_LENGTH {
            return Err(HalyardError::Protocol(format!(
                "Version string too long: {} bytes (max {})",
                line.len(),
                MAX_VERSION_LENGTH
            )));
        }

        if line.contains('\0') {
            return Err(HalyardError::Protocol(
                "Version string contains null byte".to_string(),
            ));
        }

        if !line.starts_with("SSH-") {
            return Err(HalyardError::Protocol(format!(
                "Invalid version string: must start with 'SSH-', got '{}'",
                line
            )));
        }

        // SSH-protoversion-softwareversion[ comments]
        let parts: Vec<&str> = line.splitn(3, '-').collect();
        if parts.len() < 3 {
            return Err(HalyardError::Protocol(format!(
                "Invalid version string format: '{}'",
                line
            )));
        }

        let proto_version = parts[1];
        let rest = parts[2];

        if proto_version != "2.0" && proto_version != "1.99" {
            return Err(HalyardError::Protocol(format!(
                "Unsupported protocol version: '{}' (expected '2.0' or '1.99')",
                proto_version
            )));
        }

        let (software_version, comments) = if let Some(space_pos) = rest.find(' ') {
            let software = rest[..space_pos].to_string();
            let comments = rest[space_pos + 1..].trim().to_string();
            (software, Some(comments))
        } else {
            (rest.to_string(), None)
        };

        Ok(Self {
            proto_version: proto_version.to_string(),
            software_version,
            comments,
        })
    }

    /// Returns the protocol version (e.g., "2.0").
    pub fn proto_version(&self) -> &str {
        &self.proto_version
    }

    /// Returns the software version (e.g., "Halyard_0.1.0").
    pub fn software(&self) -> &str {
        &self.software_version
    }

    /// Returns the comments, if any.
    pub fn comments(&self) -> Option<&str> {
        self.comments.as_deref()
    }

    /// Converts to wire format (with CR LF).
    ///
    /// # Example
    ///
    /// ```rust
    /// use halyard_proto::ssh::version::Version;
    ///
    /// let version = Version::new("Halyard_0.1.0", None);
    /// assert_eq!(version.to_wire_format(), b"SSH-2.0-Halyard_0.1.0\r\n");
    /// ```
    pub fn to_wire_format(&self) -> Vec<u8> {
        format!("{}\r\n", self).into_bytes()
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SSH-{}-{}", self.proto_version, self.software_version)?;
        if let Some(comments) = &self.comments {
            write!(f, " {}", comments)?;
        }
        Ok(())
    }
}
