//! Status helper enums mapping to SMALLINT lookup tables.
//!
//! Each enum variant's discriminant matches the seed data order (1-based)
//! in the corresponding `*_statuses` database table.

/// Status ID type matching SMALLINT in the database.
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
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $val ),+
        }

        impl $name {
            /// Return the database status ID.
            pub fn id(self) -> StatusId {
                self as StatusId
            }

            /// Resolve a database status ID. Unknown IDs yield `None`.
            pub fn from_id(id: StatusId) -> Option<Self> {
                match id {
                    $( $val => Some(Self::$variant), )+
                    _ => None,
                }
            }

            /// Lower-case name matching the lookup table's `name` column.
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

        impl serde::Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }
    };
}

define_status_enum! {
    /// Generation job lifecycle status.
    GenerationJobStatus {
        Pending = 1 => "pending",
        Processing = 2 => "processing",
        Polling = 3 => "polling",
        Downloading = 4 => "downloading",
        Completed = 5 => "completed",
        Failed = 6 => "failed",
    }
}

impl GenerationJobStatus {
    /// Completed and failed jobs never change again.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Statuses a runner may still be working on.
pub const NON_TERMINAL_JOB_STATUSES: [GenerationJobStatus; 4] = [
    GenerationJobStatus::Pending,
    GenerationJobStatus::Processing,
    GenerationJobStatus::Polling,
    GenerationJobStatus::Downloading,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_status_ids_match_seed_data() {
        assert_eq!(GenerationJobStatus::Pending.id(), 1);
        assert_eq!(GenerationJobStatus::Processing.id(), 2);
        assert_eq!(GenerationJobStatus::Polling.id(), 3);
        assert_eq!(GenerationJobStatus::Downloading.id(), 4);
        assert_eq!(GenerationJobStatus::Completed.id(), 5);
        assert_eq!(GenerationJobStatus::Failed.id(), 6);
    }

    #[test]
    fn status_into_status_id() {
        let id: StatusId = GenerationJobStatus::Polling.into();
        assert_eq!(id, 3);
    }

    #[test]
    fn from_id_round_trips() {
        for id in 1..=6 {
            let status = GenerationJobStatus::from_id(id).unwrap();
            assert_eq!(status.id(), id);
        }
        assert_eq!(GenerationJobStatus::from_id(0), None);
        assert_eq!(GenerationJobStatus::from_id(7), None);
    }

    #[test]
    fn only_completed_and_failed_are_terminal() {
        assert!(GenerationJobStatus::Completed.is_terminal());
        assert!(GenerationJobStatus::Failed.is_terminal());
        for status in NON_TERMINAL_JOB_STATUSES {
            assert!(!status.is_terminal());
        }
    }
}
