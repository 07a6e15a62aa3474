// =============================================================================
// C5BOOT - Memory Management Unit (MMU)
// =============================================================================
// Flat section mapping with the ARMv7 short-descriptor format: one 4096-entry
// first-level table, each entry translating 1 MiB.
//
// Region descriptors are a build-time contract. `check_regions` exists for
// compile-time assertions on a board's region list; the builder itself never
// validates, so a malformed list faults the same way it always would.
//
// Reference: ARMv7-A ARM B3.5.1 Short-descriptor translation table format
// =============================================================================

use bitflags::bitflags;
use core::fmt;

/// Number of first-level entries (4 GiB / 1 MiB).
pub const ENTRIES_COUNT: usize = 4096;

pub const SECTION_SHIFT: u32 = 20;
pub const SECTION_SIZE: u32 = 1 << SECTION_SHIFT;

/// Required alignment of the first-level table when TTBCR.N = 0.
pub const TABLE_ALIGN: usize = 16 * 1024;

/// Fault entry: any access raises a translation fault.
pub const FAULT_ENTRY: u32 = 0;

const SECTION_TYPE: u32 = 0b10;
const SECTION_BASE_MASK: u32 = 0xFFF0_0000;

bitflags! {
    /// Single-bit fields of a section descriptor.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SectionFlags: u32 {
        const B = 1 << 2;
        const C = 1 << 3;
        /// Execute-never
        const XN = 1 << 4;
        const AP2 = 1 << 15;
        /// Shareable
        const S = 1 << 16;
        /// Not global
        const NG = 1 << 17;
        /// Non-secure
        const NS = 1 << 19;
    }
}

const AP_SHIFT: u32 = 10;
const TEX_SHIFT: u32 = 12;

/// Access permissions (AP[2:0]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessPermission {
    NoAccess,
    /// Privileged read/write, no user access
    PrivOnly,
    /// Privileged read/write, user read-only
    UserReadOnly,
    FullAccess,
    PrivReadOnly,
    ReadOnly,
}

impl AccessPermission {
    const fn bits(self) -> u32 {
        let (ap2, ap) = match self {
            AccessPermission::NoAccess => (0, 0b00),
            AccessPermission::PrivOnly => (0, 0b01),
            AccessPermission::UserReadOnly => (0, 0b10),
            AccessPermission::FullAccess => (0, 0b11),
            AccessPermission::PrivReadOnly => (1, 0b01),
            AccessPermission::ReadOnly => (1, 0b11),
        };
        (ap << AP_SHIFT) | if ap2 == 1 { SectionFlags::AP2.bits() } else { 0 }
    }
}

/// Memory type and cacheability (TEX/C/B with TEX remap off).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryAttribute {
    StronglyOrdered,
    /// Shareable device
    Device,
    NonCacheable,
    WriteThrough,
    /// Write-back, no write-allocate
    WriteBack,
    /// Write-back, write-allocate
    WriteBackAllocate,
}

impl MemoryAttribute {
    const fn bits(self) -> u32 {
        let (tex, c, b) = match self {
            MemoryAttribute::StronglyOrdered => (0b000, 0, 0),
            MemoryAttribute::Device => (0b000, 0, 1),
            MemoryAttribute::NonCacheable => (0b001, 0, 0),
            MemoryAttribute::WriteThrough => (0b000, 1, 0),
            MemoryAttribute::WriteBack => (0b000, 1, 1),
            MemoryAttribute::WriteBackAllocate => (0b001, 1, 1),
        };
        (tex << TEX_SHIFT) | (c << 3) | (b << 2)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shareability {
    NonShareable,
    Shareable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityState {
    Secure,
    NonSecure,
}

/// One contiguous, section-aligned mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryRegion {
    pub virt: u32,
    pub phys: u32,
    pub size: u32,
    pub access: AccessPermission,
    pub attributes: MemoryAttribute,
    pub shareable: Shareability,
    pub executable: bool,
    pub security: SecurityState,
}

impl MemoryRegion {
    /// Descriptor bits shared by every section of this region.
    pub const fn section_bits(&self) -> u32 {
        let mut bits = SECTION_TYPE | self.access.bits() | self.attributes.bits();
        if matches!(self.shareable, Shareability::Shareable) {
            bits |= SectionFlags::S.bits();
        }
        if !self.executable {
            bits |= SectionFlags::XN.bits();
        }
        if matches!(self.security, SecurityState::NonSecure) {
            bits |= SectionFlags::NS.bits();
        }
        bits
    }

    /// Index of the first table entry this region writes.
    pub const fn first_section(&self) -> usize {
        (self.virt >> SECTION_SHIFT) as usize
    }

    /// Number of whole sections the region spans.
    pub const fn sections(&self) -> usize {
        (self.size >> SECTION_SHIFT) as usize
    }
}

/// Why a region list breaks the mapping contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionError {
    /// Base or size is not a multiple of 1 MiB.
    Misaligned { index: usize },
    Empty { index: usize },
    /// The region runs past the top of the 32-bit address space.
    OutOfRange { index: usize },
    Overlap { first: usize, second: usize },
}

impl fmt::Display for RegionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegionError::Misaligned { index } => write!(f, "region {} is not 1 MiB aligned", index),
            RegionError::Empty { index } => write!(f, "region {} is empty", index),
            RegionError::OutOfRange { index } => write!(f, "region {} runs past 4 GiB", index),
            RegionError::Overlap { first, second } => {
                write!(f, "regions {} and {} overlap", first, second)
            }
        }
    }
}

/// Check a region list against the mapping contract.
///
/// Meant for `const` assertions; the table builder does not call it.
pub const fn check_regions(regions: &[MemoryRegion]) -> Result<(), RegionError> {
    let mask = SECTION_SIZE - 1;
    let mut i = 0;
    while i < regions.len() {
        let region = &regions[i];
        if region.virt & mask != 0 || region.phys & mask != 0 || region.size & mask != 0 {
            return Err(RegionError::Misaligned { index: i });
        }
        if region.size == 0 {
            return Err(RegionError::Empty { index: i });
        }
        if region.first_section() + region.sections() > ENTRIES_COUNT
            || (region.phys as u64) + (region.size as u64) > 1 << 32
        {
            return Err(RegionError::OutOfRange { index: i });
        }
        let mut j = 0;
        while j < i {
            let other = &regions[j];
            let (a, b) = (region.first_section(), other.first_section());
            if a < b + other.sections() && b < a + region.sections() {
                return Err(RegionError::Overlap { first: j, second: i });
            }
            j += 1;
        }
        i += 1;
    }
    Ok(())
}

/// First-level translation table.
#[repr(C, align(16384))]
pub struct TranslationTable {
    entries: [u32; ENTRIES_COUNT],
}

impl TranslationTable {
    pub const fn new() -> Self {
        Self { entries: [FAULT_ENTRY; ENTRIES_COUNT] }
    }

    /// Rebuild the table from `regions`, in order.
    ///
    /// Every entry starts out as a fault; a section covered by more than one
    /// region ends up with the attributes of the last one in the list.
    pub fn populate(&mut self, regions: &[MemoryRegion]) {
        self.entries.fill(FAULT_ENTRY);

        for region in regions {
            let bits = region.section_bits();
            let phys = region.phys & SECTION_BASE_MASK;

            for (i, entry) in self
                .entries
                .iter_mut()
                .skip(region.first_section())
                .take(region.sections())
                .enumerate()
            {
                let base = phys.wrapping_add((i as u32) << SECTION_SHIFT);
                *entry = (base & SECTION_BASE_MASK) | bits;
            }

            log::debug!(
                "[mmu] {:#010x} -> {:#010x} ({} MiB, {:?})",
                region.virt,
                region.phys,
                region.sections(),
                region.attributes
            );
        }
    }

    pub fn entry(&self, index: usize) -> u32 {
        self.entries[index]
    }

    /// Entry translating virtual address `va`.
    pub fn lookup(&self, va: u32) -> u32 {
        self.entries[(va >> SECTION_SHIFT) as usize]
    }

    pub fn entries(&self) -> &[u32; ENTRIES_COUNT] {
        &self.entries
    }

    /// Number of entries that translate (are not faults).
    pub fn mapped_sections(&self) -> usize {
        self.entries.iter().filter(|&&e| e != FAULT_ENTRY).count()
    }

    /// Physical address to program into TTBR0 (identity mapped during boot).
    pub fn base(&self) -> usize {
        self.entries.as_ptr() as usize
    }
}

impl Default for TranslationTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Programs the translation registers and switches the MMU on.
pub trait TranslationControl {
    /// Point TTBR0 at `table_base`, flush stale translations and enable
    /// translation. Caches must already be disabled.
    fn install_translation_table(&mut self, table_base: usize);
}

/// Populate `table` from `regions` and enable translation with it.
pub fn init<T: TranslationControl + ?Sized>(
    mmu: &mut T,
    table: &mut TranslationTable,
    regions: &[MemoryRegion],
) {
    table.populate(regions);
    log::debug!("[mmu] {} sections mapped, table at {:#010x}", table.mapped_sections(), table.base());
    mmu.install_translation_table(table.base());
}

#[cfg(target_arch = "arm")]
impl TranslationControl for crate::cpu::CortexA9 {
    fn install_translation_table(&mut self, table_base: usize) {
        use crate::registers::*;

        unsafe {
            write_dacr(DACR_ALL_CLIENT);
            write_ttbcr(0);
            write_ttbr0(table_base as u32 | TTBR0_WALK_WBWA_SHARED);
            tlbiall();
            bpiall();
            dsb();
            isb();
            write_sctlr(read_sctlr() | Sctlr::M.bits());
            isb();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SDRAM: MemoryRegion = MemoryRegion {
        virt: 0x0000_0000,
        phys: 0x0000_0000,
        size: 0xC000_0000,
        access: AccessPermission::PrivOnly,
        attributes: MemoryAttribute::WriteBackAllocate,
        shareable: Shareability::Shareable,
        executable: true,
        security: SecurityState::Secure,
    };

    const DEVICE: MemoryRegion = MemoryRegion {
        virt: 0xC000_0000,
        phys: 0xC000_0000,
        size: 0x4000_0000,
        access: AccessPermission::PrivOnly,
        attributes: MemoryAttribute::Device,
        shareable: Shareability::Shareable,
        executable: false,
        security: SecurityState::Secure,
    };

    fn table() -> Box<TranslationTable> {
        Box::new(TranslationTable::new())
    }

    #[test]
    fn cyclone_v_map_fills_every_entry() {
        let mut table = table();
        table.populate(&[SDRAM, DEVICE]);

        assert_eq!(table.mapped_sections(), ENTRIES_COUNT);
        assert!(table.entries()[..3072].iter().all(|&e| e & !SECTION_BASE_MASK == 0x0001_140E));
        assert!(table.entries()[3072..].iter().all(|&e| e & !SECTION_BASE_MASK == 0x0001_0416));
    }

    #[test]
    fn sections_are_identity_mapped() {
        let mut table = table();
        table.populate(&[SDRAM, DEVICE]);

        assert_eq!(table.entry(0), 0x0001_140E);
        assert_eq!(table.entry(1), 0x0011_140E);
        assert_eq!(table.entry(3071), 0xBFF1_140E);
        assert_eq!(table.entry(3072), 0xC001_0416);
        assert_eq!(table.lookup(0xFFFF_FFFF), 0xFFF1_0416);
    }

    #[test]
    fn remapped_region_uses_physical_base() {
        let mut table = table();
        table.populate(&[MemoryRegion { virt: 0x8000_0000, phys: 0x0010_0000, size: 0x0020_0000, ..SDRAM }]);

        assert_eq!(table.lookup(0x8000_0000) & SECTION_BASE_MASK, 0x0010_0000);
        assert_eq!(table.lookup(0x801F_FFFF) & SECTION_BASE_MASK, 0x0020_0000);
        assert_eq!(table.mapped_sections(), 2);
    }

    #[test]
    fn uncovered_addresses_fault() {
        let mut table = table();
        table.populate(&[DEVICE]);

        assert_eq!(table.lookup(0x0000_0000), FAULT_ENTRY);
        assert_eq!(table.lookup(0xBFFF_FFFF), FAULT_ENTRY);
        assert_eq!(table.mapped_sections(), 1024);
    }

    #[test]
    fn later_region_wins_on_overlap() {
        let strongly_ordered = MemoryRegion {
            virt: 0x0010_0000,
            phys: 0x0010_0000,
            size: SECTION_SIZE,
            attributes: MemoryAttribute::StronglyOrdered,
            ..SDRAM
        };
        let mut table = table();
        table.populate(&[SDRAM, strongly_ordered]);

        assert_eq!(table.entry(1), 0x0011_0402 | SectionFlags::S.bits());
        assert_eq!(table.entry(2), 0x0021_140E);

        table.populate(&[strongly_ordered, SDRAM]);
        assert_eq!(table.entry(1), 0x0011_140E);
    }

    #[test]
    fn repopulating_clears_previous_mappings() {
        let mut table = table();
        table.populate(&[SDRAM, DEVICE]);
        table.populate(&[DEVICE]);

        assert_eq!(table.lookup(0x0000_0000), FAULT_ENTRY);
    }

    #[test]
    fn table_base_is_16k_aligned() {
        let table = table();

        assert_eq!(table.base() % TABLE_ALIGN, 0);
        assert_eq!(core::mem::align_of::<TranslationTable>(), TABLE_ALIGN);
        assert_eq!(core::mem::size_of::<TranslationTable>(), ENTRIES_COUNT * 4);
    }

    #[test]
    fn permission_and_security_bits() {
        let region = MemoryRegion {
            access: AccessPermission::ReadOnly,
            security: SecurityState::NonSecure,
            shareable: Shareability::NonShareable,
            attributes: MemoryAttribute::NonCacheable,
            ..DEVICE
        };

        assert_eq!(region.section_bits(), 0b10 | (0b11 << 10) | (1 << 15) | (1 << 12) | (1 << 4) | (1 << 19));
    }

    #[test]
    fn check_regions_accepts_the_board_map() {
        assert_eq!(check_regions(&[SDRAM, DEVICE]), Ok(()));
    }

    #[test]
    fn check_regions_rejects_broken_maps() {
        let misaligned = MemoryRegion { size: 0x8_0000, ..SDRAM };
        let empty = MemoryRegion { size: 0, ..SDRAM };
        let too_far = MemoryRegion { virt: 0xF000_0000, size: 0x2000_0000, ..DEVICE };

        assert_eq!(check_regions(&[misaligned]), Err(RegionError::Misaligned { index: 0 }));
        assert_eq!(check_regions(&[DEVICE, empty]), Err(RegionError::Empty { index: 1 }));
        assert_eq!(check_regions(&[too_far]), Err(RegionError::OutOfRange { index: 0 }));
        assert_eq!(
            check_regions(&[SDRAM, DEVICE, DEVICE]),
            Err(RegionError::Overlap { first: 1, second: 2 })
        );
    }

    #[test]
    fn region_errors_render() {
        assert_eq!(
            RegionError::Overlap { first: 0, second: 3 }.to_string(),
            "regions 0 and 3 overlap"
        );
    }

    struct Recorder(Option<usize>);

    impl TranslationControl for Recorder {
        fn install_translation_table(&mut self, table_base: usize) {
            self.0 = Some(table_base);
        }
    }

    #[test]
    fn init_installs_the_populated_table() {
        let mut table = table();
        let mut mmu = Recorder(None);

        init(&mut mmu, &mut table, &[SDRAM, DEVICE]);

        assert_eq!(mmu.0, Some(table.base()));
        assert_eq!(table.mapped_sections(), ENTRIES_COUNT);
    }
}
