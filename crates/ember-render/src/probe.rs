// SPDX-License-Identifier: CEPL-1.0
//! Side-effect-free capability queries over what a device reports.
use bitflags::bitflags;
use ember_core::PresentError;

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct QueueCapabilities: u32 {
        const GRAPHICS = 1 << 0;
        const COMPUTE = 1 << 1;
        const TRANSFER = 1 << 2;
        const SPARSE_BINDING = 1 << 3;
    }
}

/// One queue family as reported by the device, with present support already
/// resolved against the target surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueueFamilyInfo {
    pub capabilities: QueueCapabilities,
    pub queue_count: u32,
    pub present_support: bool,
}

/// First family with at least one queue whose flags contain `required`.
pub fn find_queue_family(families: &[QueueFamilyInfo], required: QueueCapabilities) -> Option<u32> {
    families
        .iter()
        .position(|f| f.queue_count > 0 && f.capabilities.contains(required))
        .map(|i| i as u32)
}

/// First family able to present to the surface, independent of its flags.
pub fn find_present_queue_family(families: &[QueueFamilyInfo]) -> Option<u32> {
    families
        .iter()
        .position(|f| f.queue_count > 0 && f.present_support)
        .map(|i| i as u32)
}

/// Number of `requested` names present in `available`.
pub fn count_matching<S: AsRef<str>>(available: &[S], requested: &[&str]) -> usize {
    requested
        .iter()
        .filter(|want| available.iter().any(|have| have.as_ref() == **want))
        .count()
}

/// The `requested` names that `available` lacks, in request order.
pub fn missing<'a, S: AsRef<str>>(available: &[S], requested: &[&'a str]) -> Vec<&'a str> {
    requested
        .iter()
        .copied()
        .filter(|want| !available.iter().any(|have| have.as_ref() == *want))
        .collect()
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    pub graphics: Option<u32>,
    pub compute: Option<u32>,
    pub present: Option<u32>,
}

/// Graphics and present families, both resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PresentableQueues {
    pub graphics: u32,
    pub present: u32,
}

impl QueueFamilyIndices {
    pub fn from_families(families: &[QueueFamilyInfo]) -> Self {
        Self {
            graphics: find_queue_family(families, QueueCapabilities::GRAPHICS),
            compute: find_queue_family(families, QueueCapabilities::COMPUTE),
            present: find_present_queue_family(families),
        }
    }

    pub fn presentable(&self) -> Result<PresentableQueues, PresentError> {
        let graphics = self
            .graphics
            .ok_or_else(|| PresentError::CapabilityNotFound("graphics queue family".into()))?;
        let present = self
            .present
            .ok_or_else(|| PresentError::CapabilityNotFound("present queue family".into()))?;
        Ok(PresentableQueues { graphics, present })
    }

    /// Distinct resolved families, ascending; one device queue is created per entry.
    pub fn unique(&self) -> Vec<u32> {
        let mut out: Vec<u32> = [self.graphics, self.compute, self.present]
            .into_iter()
            .flatten()
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(caps: QueueCapabilities, present: bool) -> QueueFamilyInfo {
        QueueFamilyInfo {
            capabilities: caps,
            queue_count: 1,
            present_support: present,
        }
    }

    #[test]
    fn each_family_tests_its_own_flags() {
        // Family 0 is transfer-only; a scan that kept looking at family 0
        // would never find graphics.
        let families = [
            family(QueueCapabilities::TRANSFER, false),
            family(QueueCapabilities::COMPUTE, false),
            family(QueueCapabilities::GRAPHICS | QueueCapabilities::COMPUTE, true),
        ];
        assert_eq!(find_queue_family(&families, QueueCapabilities::GRAPHICS), Some(2));
        assert_eq!(find_queue_family(&families, QueueCapabilities::COMPUTE), Some(1));
        assert_eq!(
            find_queue_family(&families, QueueCapabilities::GRAPHICS | QueueCapabilities::COMPUTE),
            Some(2)
        );
    }

    #[test]
    fn first_match_wins_not_most_specialised() {
        let families = [
            family(QueueCapabilities::all(), false),
            family(QueueCapabilities::COMPUTE, false),
        ];
        assert_eq!(find_queue_family(&families, QueueCapabilities::COMPUTE), Some(0));
    }

    #[test]
    fn empty_families_are_skipped() {
        let mut empty = family(QueueCapabilities::GRAPHICS, true);
        empty.queue_count = 0;
        let families = [empty, family(QueueCapabilities::GRAPHICS, true)];
        assert_eq!(find_queue_family(&families, QueueCapabilities::GRAPHICS), Some(1));
        assert_eq!(find_present_queue_family(&families), Some(1));
    }

    #[test]
    fn present_selection_is_independent() {
        let families = [
            family(QueueCapabilities::GRAPHICS, false),
            family(QueueCapabilities::TRANSFER, true),
        ];
        let idx = QueueFamilyIndices::from_families(&families);
        assert_eq!(idx.graphics, Some(0));
        assert_eq!(idx.present, Some(1));
        assert_eq!(idx.compute, None);
        assert_eq!(idx.presentable().unwrap(), PresentableQueues { graphics: 0, present: 1 });
        assert_eq!(idx.unique(), vec![0, 1]);
    }

    #[test]
    fn missing_present_is_not_found() {
        let families = [family(QueueCapabilities::GRAPHICS, false)];
        let err = QueueFamilyIndices::from_families(&families).presentable().unwrap_err();
        assert!(matches!(err, PresentError::CapabilityNotFound(ref what) if what.contains("present")));
    }

    #[test]
    fn unique_collapses_shared_family() {
        let idx = QueueFamilyIndices {
            graphics: Some(0),
            compute: Some(0),
            present: Some(0),
        };
        assert_eq!(idx.unique(), vec![0]);
    }

    #[test]
    fn string_matching() {
        let available = vec!["VK_KHR_surface".to_string(), "VK_EXT_debug_utils".to_string()];
        let requested = ["VK_KHR_surface", "VK_KHR_xcb_surface", "VK_EXT_debug_utils"];
        assert_eq!(count_matching(&available, &requested), 2);
        assert_eq!(missing(&available, &requested), vec!["VK_KHR_xcb_surface"]);
        assert_eq!(count_matching::<String>(&[], &[]), 0);
    }
}
