//! Catalog of known UF2 board family ids.
//!
//! Family ids come from <https://github.com/microsoft/uf2/blob/master/utils/uf2families.json>.
//! Unknown ids are common in the wild and resolve to `None`, never an error.

/// Descriptive metadata for one board family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FamilyDescriptor {
    pub id: u32,
    pub name: &'static str,
    pub description: &'static str,
    pub arch: Option<&'static str>,
    pub cpu: Option<&'static str>,
    pub bits: Option<u8>,
}

/// Exact-key lookup over a catalog sorted ascending by id.
#[derive(Debug, Clone, Copy)]
pub struct FamilyTable<'a> {
    entries: &'a [FamilyDescriptor],
}

impl<'a> FamilyTable<'a> {
    /// Wrap a caller-supplied catalog. Entries must be sorted ascending by
    /// id with no duplicates, as [`BUILTIN_FAMILIES`] is.
    pub const fn new(entries: &'a [FamilyDescriptor]) -> Self {
        Self { entries }
    }

    pub fn lookup(&self, id: u32) -> Option<&'a FamilyDescriptor> {
        self.entries
            .binary_search_by_key(&id, |f| f.id)
            .ok()
            .map(|idx| &self.entries[idx])
    }

    pub fn entries(&self) -> &'a [FamilyDescriptor] {
        self.entries
    }
}

impl Default for FamilyTable<'static> {
    fn default() -> Self {
        Self::new(BUILTIN_FAMILIES)
    }
}

const fn family(
    id: u32,
    name: &'static str,
    description: &'static str,
    arch: Option<&'static str>,
    cpu: Option<&'static str>,
    bits: Option<u8>,
) -> FamilyDescriptor {
    FamilyDescriptor {
        id,
        name,
        description,
        arch,
        cpu,
        bits,
    }
}

/// The compiled-in catalog, sorted ascending by id.
#[rustfmt::skip]
pub const BUILTIN_FAMILIES: &[FamilyDescriptor] = &[
    family(0x00ff6919, "STM32L4", "ST STM32L4xx", None, None, None),
    family(0x04240bdf, "STM32L5", "ST STM32L5xx", None, None, None),
    family(0x06d1097b, "STM32F411xC", "ST STM32F411xC", None, None, None),
    family(0x11de784a, "M0SENSE", "M0SENSE BL702", None, None, None),
    family(0x16573617, "ATMEGA32", "Microchip (Atmel) ATmega32", Some("avr"), None, Some(8)),
    family(0x1851780a, "SAML21", "Microchip (Atmel) SAML21", Some("arm"), Some("cortex"), Some(32)),
    family(0x1b57745f, "NRF52", "Nordic NRF52", Some("arm"), Some("cortex"), Some(32)),
    family(0x1c5f21b0, "ESP32", "ESP32", Some("xtensa"), None, Some(32)),
    family(0x1e1f432d, "STM32L1", "ST STM32L1xx", None, None, None),
    family(0x202e3a91, "STM32L0", "ST STM32L0xx", None, None, None),
    family(0x21460ff0, "STM32WL", "ST STM32WLxx", None, None, None),
    family(0x2abc77ec, "LPC55", "NXP LPC55xx", None, None, None),
    family(0x2b88d29c, "ESP32C2", "ESP32-C2", Some("riscv"), None, Some(32)),
    family(0x2dc309c5, "STM32F411xE", "ST STM32F411xE", None, None, None),
    family(0x300f5633, "STM32G0", "ST STM32G0xx", None, None, None),
    family(0x31d228c6, "GD32F350", "GD32F350", None, None, None),
    family(0x332726f6, "ESP32H2", "ESP32-H2", Some("riscv"), None, Some(32)),
    family(0x3d308e94, "ESP32P4", "ESP32-P4", None, None, None),
    family(0x4b684d71, "MaixPlay-U4", "Sipeed MaixPlay-U4(BL618)", None, None, None),
    family(0x4c71240a, "STM32G4", "ST STM32G4xx", None, None, None),
    family(0x4f6ace52, "CSK4", "LISTENAI CSK300x/400x", None, None, None),
    family(0x4fb2d5bd, "MIMXRT10XX", "NXP i.MX RT10XX", None, None, None),
    family(0x53b80f00, "STM32F7", "ST STM32F7xx", None, None, None),
    family(0x540ddf62, "ESP32C6", "ESP32-C6", None, None, None),
    family(0x55114460, "SAMD51", "Microchip (Atmel) SAMD51", None, None, None),
    family(0x57755a57, "STM32F4", "ST STM32F4xx", None, None, None),
    family(0x5a18069b, "FX2", "Cypress FX2", None, None, None),
    family(0x5d1a0a2e, "STM32F2", "ST STM32F2xx", None, None, None),
    family(0x5ee21072, "STM32F1", "ST STM32F103", None, None, None),
    family(0x621e937a, "NRF52833", "Nordic NRF52833", None, None, None),
    family(0x647824b6, "STM32F0", "ST STM32F0xx", None, None, None),
    family(0x68ed2b88, "SAMD21", "Microchip (Atmel) SAMD21", None, None, None),
    family(0x699b62ec, "CH32V", "WCH CH32V2xx and CH32V3xx", None, None, None),
    family(0x6b846188, "STM32F3", "ST STM32F3xx", None, None, None),
    family(0x6d0922fa, "STM32F407", "ST STM32F407", None, None, None),
    family(0x6db66082, "STM32H7", "ST STM32H7xx", None, None, None),
    family(0x6e7348a8, "CSK6", "LISTENAI CSK60xx", None, None, None),
    family(0x6f752678, "NRF52832xxAB", "Nordic NRF52832xxAB", None, None, None),
    family(0x70d16653, "STM32WB", "ST STM32WBxx", None, None, None),
    family(0x72721d4e, "NRF52832xxAA", "Nordic NRF52832xxAA", None, None, None),
    family(0x77d850c4, "ESP32C61", "ESP32-C61", None, None, None),
    family(0x7eab61ed, "ESP8266", "ESP8266", None, None, None),
    family(0x7f83e793, "KL32L2", "NXP KL32L2x", None, None, None),
    family(0x8fb060fe, "STM32F407VG", "ST STM32F407VG", None, None, None),
    family(0x9517422f, "RZA1LU", "Renesas RZ/A1LU (R7S7210xx)", None, None, None),
    family(0x9af03e33, "GD32VF103", "GigaDevice GD32VF103", None, None, None),
    family(0xa0c97b8e, "AT32F415", "ArteryTek AT32F415", None, None, None),
    family(0xada52840, "NRF52840", "Nordic NRF52840", None, None, None),
    family(0xbfdd4eee, "ESP32S2", "ESP32-S2", Some("xtensa"), None, Some(32)),
    family(0xc47e5767, "ESP32S3", "ESP32-S3", Some("xtensa"), None, Some(32)),
    family(0xd42ba06c, "ESP32C3", "ESP32-C3", Some("riscv"), None, Some(32)),
    family(0xe48bff56, "RP2040", "Raspberry Pi RP2040", Some("arm"), Some("cortex"), Some(16)),
    family(0xe48bff57, "RP2XXX_ABSOLUTE", "Raspberry Pi Microcontrollers: Absolute (unpartitioned) download", None, None, None),
    family(0xe48bff58, "RP2XXX_DATA", "Raspberry Pi Microcontrollers: Data partition download", None, None, None),
    family(0xe48bff59, "RP2350_ARM_S", "Raspberry Pi RP2350, Secure Arm image", Some("arm"), Some("cortex"), Some(32)),
    family(0xe48bff5a, "RP2350_RISCV", "Raspberry Pi RP2350, RISC-V image", Some("riscv"), None, Some(32)),
    family(0xe48bff5b, "RP2350_ARM_NS", "Raspberry Pi RP2350, Non-secure Arm image", Some("arm"), Some("cortex"), Some(32)),
    family(0xf71c0343, "ESP32C5", "ESP32-C5", None, None, None),
];
