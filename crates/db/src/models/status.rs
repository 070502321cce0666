//! Status helper enums mapping to SMALLSERIAL/SMALLINT lookup tables.
//!
//! Each enum variant's discriminant matches the seed data order (1-based)
//! in the corresponding `*_statuses` database table.

use litessay_core::scheduling::state_machine;

/// Status ID type matching SMALLINT/SMALLSERIAL in the database.
pub type StatusId = i16;

macro_rules! define_status_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $val:literal => $label:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[repr(i16)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $val ),+
        }

        impl $name {
            /// Return the database status ID.
            pub fn id(self) -> StatusId {
                self as StatusId
            }

            /// Resolve a database status ID to the corresponding variant.
            pub fn from_id(id: StatusId) -> Option<Self> {
                match id {
                    $( $val => Some(Self::$variant), )+
                    _ => None,
                }
            }

            /// Lowercase name matching the `name` column of the lookup table.
            pub fn as_str(self) -> &'static str {
                match self {
                    $( Self::$variant => $label, )+
                }
            }
        }

        impl From<$name> for StatusId {
            fn from(value: $name) -> Self {
                value as StatusId
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

define_status_enum! {
    /// Pipeline job execution status.
    JobStatus {
        Queued = 1 => "queued",
        Running = 2 => "running",
        Succeeded = 3 => "succeeded",
        Failed = 4 => "failed",
    }
}

define_status_enum! {
    /// Document ingestion status.
    IngestStatus {
        Pending = 1 => "pending",
        Running = 2 => "running",
        Ready = 3 => "ready",
    }
}

impl JobStatus {
    /// Succeeded and failed jobs are immutable.
    pub fn is_terminal(self) -> bool {
        state_machine::is_terminal(self.id())
    }

    /// Whether the queue may move a job from `self` to `to`.
    pub fn can_transition_to(self, to: JobStatus) -> bool {
        state_machine::can_transition(self.id(), to.id())
    }
}
