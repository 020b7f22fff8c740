use std::{fmt, str::FromStr};

use binrw::binrw;
use serde::{Deserialize, Serialize};

/// Identifies one resource inside a package.
///
/// Two packages that carry a resource with the same id override each other in
/// game, which is what makes them conflict.
///
/// Renders as `TTTTTTTT_GGGGGGGG_IIIIIIIIIIIIIIII` (upper-case hex) and
/// serializes through that string form so it can key JSON maps.
#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[derive(Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ResourceId {
    pub type_id: u32,
    pub group_id: u32,
    pub instance_id: u64,
}

impl ResourceId {
    pub const fn new(type_id: u32, group_id: u32, instance_id: u64) -> Self {
        Self {
            type_id,
            group_id,
            instance_id,
        }
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:08X}_{:08X}_{:016X}",
            self.type_id, self.group_id, self.instance_id
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid resource id: {0}")]
pub struct ParseResourceIdError(String);

impl FromStr for ResourceId {
    type Err = ParseResourceIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseResourceIdError(s.to_string());
        let mut parts = s.split('_');
        let (Some(t), Some(g), Some(i), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(err());
        };
        if t.len() != 8 || g.len() != 8 || i.len() != 16 {
            return Err(err());
        }

        Ok(Self {
            type_id: u32::from_str_radix(t, 16).map_err(|_| err())?,
            group_id: u32::from_str_radix(g, 16).map_err(|_| err())?,
            instance_id: u64::from_str_radix(i, 16).map_err(|_| err())?,
        })
    }
}

impl From<ResourceId> for String {
    fn from(id: ResourceId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for ResourceId {
    type Error = ParseResourceIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_format() {
        let id = ResourceId::new(0x034AEECB, 0x0, 0x1122334455667788);
        assert_eq!(id.to_string(), "034AEECB_00000000_1122334455667788");
    }

    #[test]
    fn test_parse_display_form() {
        let id: ResourceId = "034AEECB_00000000_1122334455667788".parse().unwrap();
        assert_eq!(id, ResourceId::new(0x034AEECB, 0, 0x1122334455667788));

        assert!("034AEECB_00000000".parse::<ResourceId>().is_err());
        assert!("034AEECB_0_1122334455667788".parse::<ResourceId>().is_err());
        assert!("ZZZZZZZZ_00000000_1122334455667788"
            .parse::<ResourceId>()
            .is_err());
    }

    #[test]
    fn test_ordering_is_type_group_instance() {
        let a = ResourceId::new(1, 9, 9);
        let b = ResourceId::new(2, 0, 0);
        let c = ResourceId::new(2, 0, 1);
        assert!(a < b && b < c);
    }
}
