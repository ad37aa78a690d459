//! Volume desired and observed shapes.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{ValidationError, VolumeId};

macro_rules! wire_enum {
    ($(#[$meta:meta])* $name:ident { $($(#[$vmeta:meta])* $variant:ident => $token:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                $(#[$vmeta])*
                #[serde(rename = $token)]
                $variant,
            )+
        }

        impl $name {
            /// Token used by the control plane for this value.
            #[must_use]
            pub const fn as_wire(self) -> &'static str {
                match self {
                    $(Self::$variant => $token,)+
                }
            }

            /// Parses a control-plane token, ignoring ASCII case.
            #[must_use]
            pub fn from_wire(token: &str) -> Option<Self> {
                let trimmed = token.trim();
                $(
                    if trimmed.eq_ignore_ascii_case($token) {
                        return Some(Self::$variant);
                    }
                )+
                None
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_wire())
            }
        }
    };
}

wire_enum!(
    /// File sharing protocol exposed by the volume.
    ProtocolType {
        /// NFS version 3.
        NfsV3 => "NFSv3",
        /// NFS version 4.
        NfsV4 => "NFSv4",
    }
);

wire_enum!(
    /// Performance tier of the volume.
    StorageClass {
        /// Capacity-oriented tier.
        Basic => "Basic",
        /// SSD-backed tier.
        Advanced => "Advanced",
    }
);

wire_enum!(
    /// Billing mode applied at creation.
    ChargeMode {
        /// Prepaid yearly.
        Year => "Year",
        /// Prepaid monthly.
        Month => "Month",
        /// Pay as you go.
        Dynamic => "Dynamic",
        /// Free trial.
        Trial => "Trial",
    }
);

impl Default for ChargeMode {
    fn default() -> Self {
        Self::Month
    }
}

/// Minimum and step constraints for one storage class.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct SizeRule {
    /// Smallest size accepted, in gigabytes.
    pub minimum_gb: u64,
    /// Sizes must be a multiple of this value, in gigabytes.
    pub step_gb: u64,
}

/// Size constraints per storage class. Basic limits vary by region.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct SizeRules {
    /// Rule applied to [`StorageClass::Basic`].
    pub basic: SizeRule,
    /// Rule applied to [`StorageClass::Advanced`].
    pub advanced: SizeRule,
}

impl Default for SizeRules {
    fn default() -> Self {
        Self {
            basic: SizeRule {
                minimum_gb: 500,
                step_gb: 100,
            },
            advanced: SizeRule {
                minimum_gb: 100,
                step_gb: 100,
            },
        }
    }
}

impl SizeRules {
    /// Returns the rule for the given storage class.
    #[must_use]
    pub const fn rule(&self, storage_class: StorageClass) -> SizeRule {
        match storage_class {
            StorageClass::Basic => self.basic,
            StorageClass::Advanced => self.advanced,
        }
    }

    /// Checks a size against the minimum and step of a storage class.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::SizeBelowMinimum`] or
    /// [`ValidationError::SizeNotMultiple`] when the size is not acceptable.
    pub fn check(&self, storage_class: StorageClass, size_gb: u64) -> Result<(), ValidationError> {
        let rule = self.rule(storage_class);
        if size_gb < rule.minimum_gb {
            return Err(ValidationError::SizeBelowMinimum {
                storage_class,
                minimum_gb: rule.minimum_gb,
                size_gb,
            });
        }
        if rule.step_gb > 0 && size_gb % rule.step_gb != 0 {
            return Err(ValidationError::SizeNotMultiple {
                storage_class,
                step_gb: rule.step_gb,
                size_gb,
            });
        }
        Ok(())
    }
}

/// Desired configuration of a volume.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct VolumeSpec {
    /// Protocol exposed to clients. Fixed at creation.
    pub protocol: ProtocolType,
    /// Storage tier. Fixed at creation.
    pub storage_class: StorageClass,
    /// Size in gigabytes.
    pub size_gb: u64,
    /// Billing mode used at creation.
    #[serde(default)]
    pub charge_mode: ChargeMode,
    /// Human readable name.
    #[serde(default)]
    pub name: Option<String>,
    /// Free-form remark.
    #[serde(default)]
    pub remark: Option<String>,
    /// Business group tag used at creation.
    #[serde(default)]
    pub tag: Option<String>,
    /// Number of billing periods purchased at creation.
    #[serde(default)]
    pub quantity: Option<u32>,
}

impl VolumeSpec {
    /// Creates a spec with the required fields and monthly billing.
    #[must_use]
    pub const fn new(protocol: ProtocolType, storage_class: StorageClass, size_gb: u64) -> Self {
        Self {
            protocol,
            storage_class,
            size_gb,
            charge_mode: ChargeMode::Month,
            name: None,
            remark: None,
            tag: None,
            quantity: None,
        }
    }

    /// Sets the billing mode.
    #[must_use]
    pub const fn charge_mode(mut self, value: ChargeMode) -> Self {
        self.charge_mode = value;
        self
    }

    /// Sets the volume name, trimming whitespace.
    #[must_use]
    pub fn name(mut self, value: impl Into<String>) -> Self {
        self.name = Some(value.into().trim().to_owned());
        self
    }

    /// Sets the remark.
    #[must_use]
    pub fn remark(mut self, value: impl Into<String>) -> Self {
        self.remark = Some(value.into());
        self
    }

    /// Sets the business group tag, trimming whitespace.
    #[must_use]
    pub fn tag(mut self, value: impl Into<String>) -> Self {
        self.tag = Some(value.into().trim().to_owned());
        self
    }

    /// Sets the number of billing periods.
    #[must_use]
    pub const fn quantity(mut self, value: u32) -> Self {
        self.quantity = Some(value);
        self
    }

    /// Validates the spec against the size rules and field constraints.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] when the size breaks the storage-class
    /// rule, the name is blank, or the quantity is zero.
    pub fn validate(&self, rules: &SizeRules) -> Result<(), ValidationError> {
        rules.check(self.storage_class, self.size_gb)?;
        if self.name.as_deref().is_some_and(|name| name.trim().is_empty()) {
            return Err(ValidationError::EmptyField("name".to_owned()));
        }
        if self.quantity == Some(0) {
            return Err(ValidationError::ZeroQuantity);
        }
        Ok(())
    }
}

/// Snapshot of a volume as reported by the control plane.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct VolumeState {
    /// Remote identifier.
    pub volume_id: VolumeId,
    /// Current name.
    pub name: String,
    /// Current remark.
    pub remark: String,
    /// Provisioned size in gigabytes.
    pub size_gb: u64,
    /// Consumed size in gigabytes.
    pub used_size_gb: u64,
    /// Storage tier.
    pub storage_class: StorageClass,
    /// Protocol exposed to clients.
    pub protocol: ProtocolType,
    /// Expiration time as a Unix timestamp, when billed by period.
    pub expires_at: Option<u64>,
    /// Whether the billing period has lapsed.
    pub expired: bool,
    /// Maximum number of mount points the volume accepts.
    pub max_mount_points: u32,
    /// Number of mount points currently attached.
    pub mount_point_count: u32,
    /// Business group tag.
    pub tag: Option<String>,
    /// Creation time as a Unix timestamp.
    pub created_at: Option<u64>,
    /// Lifecycle status reported by the control plane, when it reports one.
    pub status: Option<String>,
}
