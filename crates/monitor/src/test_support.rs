use paging::AddressTranslator;

/// Size of the emulated physical memory each test thread gets. Superpage fixtures place
/// their frame at 4 MiB.
pub const MEMORY_SIZE: usize = 8 * 1024 * 1024;

pub fn setup() {
    if AddressTranslator::try_current().is_none() {
        AddressTranslator::set_current(AddressTranslator::emulated(MEMORY_SIZE));
    }
}
