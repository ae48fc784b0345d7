//! Status enums stored as TEXT columns.
//!
//! Each variant maps to the lowercase literal persisted in the database and
//! used on the wire, so the same enum serves sqlx rows, JSON bodies and
//! event payloads.

use crate::error::CoreError;

macro_rules! define_status_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $val:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        pub enum $name {
            $( $(#[$vmeta])* #[serde(rename = $val)] $variant ),+
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Return the persisted string literal.
            pub fn as_str(self) -> &'static str {
                match self {
                    $( $name::$variant => $val ),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = CoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $( $val => Ok($name::$variant), )+
                    other => Err(CoreError::Validation(format!(
                        "Invalid {}: '{other}'",
                        stringify!($name)
                    ))),
                }
            }
        }

        impl TryFrom<String> for $name {
            type Error = CoreError;

            fn try_from(value: String) -> Result<Self, CoreError> {
                value.parse()
            }
        }
    };
}

define_status_enum! {
    /// Job lifecycle status.
    JobStatus {
        Pending = "pending",
        Processing = "processing",
        Completed = "completed",
        Failed = "failed",
    }
}

impl JobStatus {
    /// Completed and failed jobs never change again.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Pending and processing jobs make up the queue.
    pub fn is_active(self) -> bool {
        !self.is_terminal()
    }
}

define_status_enum! {
    /// Clip processing status.
    ClipStatus {
        Uploading = "uploading",
        Processing = "processing",
        Ready = "ready",
        Error = "error",
        Deleted = "deleted",
    }
}

impl ClipStatus {
    /// Clips that still count against the owner's queue limit.
    pub fn counts_against_limit(self) -> bool {
        matches!(self, ClipStatus::Uploading | ClipStatus::Processing)
    }
}

define_status_enum! {
    /// Montage rendering status.
    MontageStatus {
        Queued = "queued",
        Processing = "processing",
        Completed = "completed",
        Failed = "failed",
        Cancelled = "cancelled",
    }
}

impl MontageStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            MontageStatus::Completed | MontageStatus::Failed | MontageStatus::Cancelled
        )
    }
}

define_status_enum! {
    /// Status of a single montage processing step.
    StepStatus {
        Pending = "pending",
        InProgress = "in-progress",
        Completed = "completed",
        Failed = "failed",
    }
}

define_status_enum! {
    /// Process-wide monitoring flag.
    MissionStatus {
        Idle = "idle",
        Processing = "processing",
        Error = "error",
    }
}

impl Default for MissionStatus {
    fn default() -> Self {
        MissionStatus::Idle
    }
}

define_status_enum! {
    /// Known job types. Jobs persist their type as free text, so a stored
    /// value that fails to parse is an unknown type rejected at dispatch.
    JobType {
        Queue = "queue",
        Montage = "montage",
    }
}
