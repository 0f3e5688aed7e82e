use crate::frames::tokens::RntbdTokenType;
use std::fmt::Debug;
use std::hash::Hash;
use strum::IntoEnumIterator;
use strum_macros::{EnumIter, IntoStaticStr};

/// A closed catalog of headers for one message part. Variants are
/// declared in ascending id order; iteration order is the canonical
/// encode order.
pub trait RntbdHeader:
    Copy + Clone + Debug + Eq + Hash + IntoEnumIterator + Into<&'static str> + Send + 'static
{
    fn id(self) -> u16;

    fn token_type(self) -> RntbdTokenType;

    fn is_required(self) -> bool;

    fn name(self) -> &'static str {
        self.into()
    }

    fn from_id(id: u16) -> Option<Self> {
        Self::iter().find(|header| header.id() == id)
    }
}

macro_rules! header_catalog {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $($variant:ident = ($id:literal, $token_type:ident, $required:literal)),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, EnumIter, IntoStaticStr)]
        $vis enum $name {
            $($variant),+
        }

        impl RntbdHeader for $name {
            fn id(self) -> u16 {
                match self {
                    $($name::$variant => $id),+
                }
            }

            fn token_type(self) -> RntbdTokenType {
                match self {
                    $($name::$variant => RntbdTokenType::$token_type),+
                }
            }

            fn is_required(self) -> bool {
                match self {
                    $($name::$variant => $required),+
                }
            }
        }
    };
}

header_catalog! {
    /// Headers a request frame may carry.
    pub enum RntbdRequestHeader {
        ResourceId = (0x0000, Bytes, false),
        AuthorizationToken = (0x0001, String, false),
        PayloadPresent = (0x0002, Byte, true),
        Date = (0x0004, SmallString, false),
        PageSize = (0x0005, ULong, false),
        SessionToken = (0x0006, String, false),
        ContinuationToken = (0x0007, String, false),
        IndexingDirective = (0x0008, Byte, false),
        Match = (0x0009, String, false),
        PreTriggerInclude = (0x000A, String, false),
        PostTriggerInclude = (0x000B, String, false),
        IsFanout = (0x000C, Byte, false),
        CollectionPartitionIndex = (0x000D, ULong, false),
        CollectionServiceIndex = (0x000E, ULong, false),
        PreTriggerExclude = (0x000F, String, false),
        PostTriggerExclude = (0x0010, String, false),
        ConsistencyLevel = (0x0011, Byte, false),
        EntityId = (0x0012, String, false),
        ResourceSchemaName = (0x0013, SmallString, false),
        ReplicaPath = (0x0014, String, true),
        ResourceTokenExpiry = (0x0015, ULong, false),
        DatabaseName = (0x0016, SmallString, false),
        CollectionName = (0x0017, SmallString, false),
        DocumentName = (0x0018, SmallString, false),
        AttachmentName = (0x0019, SmallString, false),
        UserName = (0x001A, SmallString, false),
        PermissionName = (0x001B, SmallString, false),
        StoredProcedureName = (0x001C, SmallString, false),
        UserDefinedFunctionName = (0x001D, SmallString, false),
        TriggerName = (0x001E, SmallString, false),
        EnableScanInQuery = (0x001F, Byte, false),
        EmitVerboseTracesInQuery = (0x0020, Byte, false),
        EnableLowPrecisionOrderBy = (0x0021, Byte, false),
        ClientVersion = (0x0022, SmallString, false),
        CanCharge = (0x0023, Byte, false),
        CanThrottle = (0x0024, Byte, false),
        PartitionKey = (0x0025, String, false),
        PartitionKeyRangeId = (0x0026, String, false),
    }
}

header_catalog! {
    /// Headers a response frame may carry.
    pub enum RntbdResponseHeader {
        PayloadPresent = (0x0000, Byte, true),
        LastStateChangeDateTime = (0x0002, SmallString, false),
        ContinuationToken = (0x0003, String, false),
        ETag = (0x0004, String, false),
        ReadsPerformed = (0x0007, ULong, false),
        WritesPerformed = (0x0008, ULong, false),
        QueriesPerformed = (0x0009, ULong, false),
        IndexTermsGenerated = (0x000A, ULong, false),
        ScriptsExecuted = (0x000B, ULong, false),
        RetryAfterMilliseconds = (0x000C, ULong, false),
        IndexingDirective = (0x000E, Byte, false),
        StorageMaxResourceQuota = (0x000F, SmallString, false),
        StorageResourceQuotaUsage = (0x0010, SmallString, false),
        SchemaVersion = (0x0011, SmallString, false),
        CollectionPartitionIndex = (0x0012, ULong, false),
        CollectionServiceIndex = (0x0013, ULong, false),
        Lsn = (0x0014, LongLong, false),
        ItemCount = (0x0015, ULong, false),
        RequestCharge = (0x0016, Double, false),
        OwnerFullName = (0x0017, SmallString, false),
        OwnerId = (0x0018, SmallString, false),
        DatabaseAccountId = (0x0019, SmallString, false),
        SessionToken = (0x001B, String, false),
        QuorumAckedLsn = (0x001C, LongLong, false),
        RequestValidationFailure = (0x001D, Byte, false),
        SubStatus = (0x001E, ULong, false),
        CollectionUpdateProgress = (0x001F, ULong, false),
        CurrentWriteQuorum = (0x0020, ULong, false),
        CurrentReplicaSetSize = (0x0021, ULong, false),
        CollectionLazyIndexProgress = (0x0022, ULong, false),
        PartitionKeyRangeId = (0x0023, SmallString, false),
        QueryMetrics = (0x0027, String, false),
        GlobalCommittedLsn = (0x0028, LongLong, false),
        NumberOfReadRegions = (0x0030, ULong, false),
        OfferReplacePending = (0x0031, Byte, false),
        ItemLsn = (0x0032, LongLong, false),
    }
}

header_catalog! {
    /// Headers of the one-shot context request sent as the first frame
    /// on a fresh connection.
    pub enum RntbdContextRequestHeader {
        ProtocolVersion = (0x0000, ULong, true),
        ClientVersion = (0x0001, SmallString, true),
        UserAgent = (0x0002, SmallString, true),
    }
}

header_catalog! {
    /// Headers of the context response that answers the context request.
    pub enum RntbdContextHeader {
        ProtocolVersion = (0x0000, ULong, true),
        ClientVersion = (0x0001, SmallString, true),
        ServerAgent = (0x0002, SmallString, true),
        ServerVersion = (0x0003, SmallString, true),
        IdleTimeoutInSeconds = (0x0004, ULong, false),
        UnauthenticatedTimeoutInSeconds = (0x0005, ULong, false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_and_ascending() {
        fn check<H: RntbdHeader>() {
            let ids: Vec<u16> = H::iter().map(RntbdHeader::id).collect();
            let mut sorted = ids.clone();
            sorted.sort_unstable();
            sorted.dedup();
            assert_eq!(ids, sorted);
        }
        check::<RntbdRequestHeader>();
        check::<RntbdResponseHeader>();
        check::<RntbdContextRequestHeader>();
        check::<RntbdContextHeader>();
    }

    #[test]
    fn lookup_by_id() {
        assert_eq!(
            Some(RntbdRequestHeader::ReplicaPath),
            RntbdRequestHeader::from_id(0x0014)
        );
        assert_eq!(None, RntbdRequestHeader::from_id(0xFFFE));
        assert_eq!(
            Some(RntbdResponseHeader::SubStatus),
            RntbdResponseHeader::from_id(0x001E)
        );
    }

    #[test]
    fn names_come_from_the_variant() {
        assert_eq!("ReplicaPath", RntbdRequestHeader::ReplicaPath.name());
        assert_eq!("SubStatus", RntbdResponseHeader::SubStatus.name());
    }

    #[test]
    fn required_flags() {
        assert!(RntbdRequestHeader::ReplicaPath.is_required());
        assert!(RntbdRequestHeader::PayloadPresent.is_required());
        assert!(!RntbdRequestHeader::SessionToken.is_required());
        assert!(RntbdResponseHeader::PayloadPresent.is_required());
    }
}
