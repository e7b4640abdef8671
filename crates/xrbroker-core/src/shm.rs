//! Component C: the shared-memory region (spec §3 "Shared memory", §6.2,
//! §9 "Volatile shared memory").
//!
//! Layout, front to back: header (counts, rotating slot cursor) → device
//! descriptor table → flat input array → layer slot array → swapchain
//! descriptor table. Every field a client may write is read by the server
//! through an explicit snapshot copy or a relaxed atomic load — never
//! indexed twice assuming stability (spec §9).

use std::ffi::CStr;
use std::fs::File;
use std::os::fd::{AsFd, OwnedFd};
use std::sync::atomic::{AtomicU32, Ordering};

use memmap2::MmapMut;
use nix::sys::memfd::{memfd_create, MFdFlags};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use xrbroker_proto::limits::{MAX_CLIENTS, MAX_DEVICES, MAX_LAYERS, MAX_SLOTS, MAX_SWAPCHAINS};

/// Packs a UTF-8 name into a fixed-size, zero-padded byte array for the
/// shared-memory device table (spec §6.2). Truncated silently if longer
/// than the field.
pub fn pack_name(name: &str) -> [u8; 64] {
    let mut packed = [0u8; 64];
    let bytes = name.as_bytes();
    let len = bytes.len().min(packed.len());
    packed[..len].copy_from_slice(&bytes[..len]);
    packed
}

/// Inputs per device, fixed so the layout is computable without probing
/// real hardware (hardware probing is out of scope, spec §1).
pub const MAX_INPUTS_PER_DEVICE: usize = 16;

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, IntoBytes, FromBytes, Immutable, KnownLayout)]
pub struct ShmHeader {
    pub device_count: u32,
    /// Mirrors `current_slot_index`; kept here too so a mapped client can
    /// read it without a syscall. The authoritative value lives in
    /// `ShmRegion::current_slot_index`, an in-process atomic the server
    /// also mirrors into this field on every advance.
    pub current_slot_index: u32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, IntoBytes, FromBytes, Immutable, KnownLayout)]
pub struct DeviceDescriptorRaw {
    pub name: [u8; 64],
    pub first_input_index: u32,
    pub input_count: u32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, IntoBytes, FromBytes, Immutable, KnownLayout)]
pub struct InputRaw {
    pub name: [u8; 64],
    /// orientation xyzw, position xyz.
    pub pose: [f32; 7],
    pub active: u32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, IntoBytes, FromBytes, Immutable, KnownLayout)]
pub struct LayerEntryRaw {
    pub layer_type: u32,
    pub device_id: u32,
    pub pose: [f32; 7],
    pub swapchain_ids: [u32; 2],
    pub extra: [f32; 8],
}

impl Default for LayerEntryRaw {
    fn default() -> Self {
        Self {
            layer_type: 0,
            device_id: u32::MAX,
            pose: [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0],
            swapchain_ids: [u32::MAX; 2],
            extra: [0.0; 8],
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, IntoBytes, FromBytes, Immutable, KnownLayout)]
pub struct SlotRaw {
    pub layer_count: u32,
    pub layers: [LayerEntryRaw; MAX_LAYERS],
}

impl Default for SlotRaw {
    fn default() -> Self {
        Self {
            layer_count: 0,
            layers: [LayerEntryRaw::default(); MAX_LAYERS],
        }
    }
}

/// Mirrors client-visible swapchain metadata (spec §4.E.4, §6.2:
/// "`swapchain_create` copies `{width, height, format, image_count}` into
/// shared memory's swapchain-descriptor slot"). Image handles themselves
/// stay out-of-band, passed back in `swapchain_create`'s reply.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, IntoBytes, FromBytes, Immutable, KnownLayout)]
pub struct SwapchainDescriptorRaw {
    pub width: u32,
    pub height: u32,
    pub format: i64,
    pub image_count: u32,
    pub active: u32,
}

/// Byte offsets of each section, computed once from the fixed capacities.
/// Kept as a pure function of the sizes so it is unit-testable without
/// mapping real memory.
#[derive(Debug, Clone, Copy)]
pub struct ShmLayout {
    pub header_offset: usize,
    pub device_table_offset: usize,
    pub input_array_offset: usize,
    pub slot_array_offset: usize,
    pub swapchain_table_offset: usize,
    pub total_size: usize,
}

impl ShmLayout {
    pub fn compute() -> Self {
        let header_offset = 0;
        let device_table_offset = header_offset + std::mem::size_of::<ShmHeader>();
        let device_table_bytes = MAX_DEVICES * std::mem::size_of::<DeviceDescriptorRaw>();
        let input_array_offset = device_table_offset + device_table_bytes;
        let input_array_bytes =
            MAX_DEVICES * MAX_INPUTS_PER_DEVICE * std::mem::size_of::<InputRaw>();
        let slot_array_offset = input_array_offset + input_array_bytes;
        let slot_array_bytes = MAX_SLOTS * std::mem::size_of::<SlotRaw>();
        let swapchain_table_offset = slot_array_offset + slot_array_bytes;
        let swapchain_table_bytes =
            MAX_CLIENTS * MAX_SWAPCHAINS * std::mem::size_of::<SwapchainDescriptorRaw>();
        let total_size = swapchain_table_offset + swapchain_table_bytes;

        Self {
            header_offset,
            device_table_offset,
            input_array_offset,
            slot_array_offset,
            swapchain_table_offset,
            total_size,
        }
    }
}

/// The mapped region plus the atomic rotating slot cursor (spec §3, §5:
/// "`current_slot_index` is read and written only under the arbiter mutex
/// or through an atomic counter").
pub struct ShmRegion {
    file: File,
    map: MmapMut,
    layout: ShmLayout,
    current_slot_index: AtomicU32,
}

impl ShmRegion {
    /// Creates a fresh anonymous shared-memory region (`memfd_create` +
    /// `mmap`), sized from `ShmLayout::compute()`.
    pub fn create() -> std::io::Result<Self> {
        let layout = ShmLayout::compute();
        let name = CStr::from_bytes_with_nul(b"xrbroker-shm\0").unwrap();
        let fd: OwnedFd = memfd_create(name, MFdFlags::MFD_CLOEXEC)
            .map_err(std::io::Error::from)?;
        let file = File::from(fd);
        file.set_len(layout.total_size as u64)?;
        let map = unsafe { MmapMut::map_mut(&file)? };

        Ok(Self {
            file,
            map,
            layout,
            current_slot_index: AtomicU32::new(0),
        })
    }

    pub fn layout(&self) -> ShmLayout {
        self.layout
    }

    /// Duplicates the backing fd for handing to a client (`instance_get_shm_fd`,
    /// spec §6.2). The client maps it read-write itself.
    pub fn dup_fd(&self) -> std::io::Result<OwnedFd> {
        self.file.as_fd().try_clone_to_owned()
    }

    fn device_descriptor_bytes(&self, device_id: u32) -> &[u8] {
        let start = self.layout.device_table_offset
            + device_id as usize * std::mem::size_of::<DeviceDescriptorRaw>();
        &self.map[start..start + std::mem::size_of::<DeviceDescriptorRaw>()]
    }

    fn device_descriptor_bytes_mut(&mut self, device_id: u32) -> &mut [u8] {
        let start = self.layout.device_table_offset
            + device_id as usize * std::mem::size_of::<DeviceDescriptorRaw>();
        &mut self.map[start..start + std::mem::size_of::<DeviceDescriptorRaw>()]
    }

    pub fn write_device_descriptor(&mut self, device_id: u32, desc: &DeviceDescriptorRaw) {
        self.device_descriptor_bytes_mut(device_id)
            .copy_from_slice(desc.as_bytes());
    }

    pub fn read_device_descriptor(&self, device_id: u32) -> DeviceDescriptorRaw {
        DeviceDescriptorRaw::read_from_bytes(self.device_descriptor_bytes(device_id)).unwrap()
    }

    fn input_bytes_mut(&mut self, input_index: u32) -> &mut [u8] {
        let start =
            self.layout.input_array_offset + input_index as usize * std::mem::size_of::<InputRaw>();
        &mut self.map[start..start + std::mem::size_of::<InputRaw>()]
    }

    fn input_bytes(&self, input_index: u32) -> &[u8] {
        let start =
            self.layout.input_array_offset + input_index as usize * std::mem::size_of::<InputRaw>();
        &self.map[start..start + std::mem::size_of::<InputRaw>()]
    }

    pub fn write_input(&mut self, input_index: u32, input: &InputRaw) {
        self.input_bytes_mut(input_index).copy_from_slice(input.as_bytes());
    }

    /// Snapshot-copies one input out of shared memory. The server never
    /// re-reads the same bytes twice assuming stability (spec §9); callers
    /// must act on the returned owned value only.
    pub fn read_input(&self, input_index: u32) -> InputRaw {
        InputRaw::read_from_bytes(self.input_bytes(input_index)).unwrap()
    }

    fn slot_bytes(&self, slot_id: u32) -> &[u8] {
        let start = self.layout.slot_array_offset + slot_id as usize * std::mem::size_of::<SlotRaw>();
        &self.map[start..start + std::mem::size_of::<SlotRaw>()]
    }

    fn slot_bytes_mut(&mut self, slot_id: u32) -> &mut [u8] {
        let start = self.layout.slot_array_offset + slot_id as usize * std::mem::size_of::<SlotRaw>();
        &mut self.map[start..start + std::mem::size_of::<SlotRaw>()]
    }

    /// Copies a layer slot's contents out of shared memory into an owned
    /// value (spec §4.E.3 step 1: "shared memory may still be written by
    /// the client" while the server is acting on the snapshot).
    pub fn read_slot(&self, slot_id: u32) -> SlotRaw {
        SlotRaw::read_from_bytes(self.slot_bytes(slot_id)).unwrap()
    }

    pub fn write_slot(&mut self, slot_id: u32, slot: &SlotRaw) {
        self.slot_bytes_mut(slot_id).copy_from_slice(slot.as_bytes());
    }

    /// Advances `current_slot_index` and mirrors it into the mapped
    /// header, atomically from the server's point of view (spec §4.E.3
    /// step 6, §5). Callers hold the arbiter lock across this call.
    pub fn advance_slot_index(&mut self, max_slots: u32) -> u32 {
        let next = (self.current_slot_index.load(Ordering::Relaxed) + 1) % max_slots;
        self.current_slot_index.store(next, Ordering::Relaxed);
        let header_bytes = &mut self.map[self.layout.header_offset
            ..self.layout.header_offset + std::mem::size_of::<ShmHeader>()];
        let mut header = ShmHeader::read_from_bytes(header_bytes).unwrap_or_default();
        header.current_slot_index = next;
        header_bytes.copy_from_slice(header.as_bytes());
        next
    }

    pub fn current_slot_index(&self) -> u32 {
        self.current_slot_index.load(Ordering::Relaxed)
    }

    /// Writes `ShmHeader.device_count` (spec §6.2), read-modify-write like
    /// `advance_slot_index` since the header is shared with other fields.
    pub fn set_device_count(&mut self, count: u32) {
        let header_bytes = &mut self.map[self.layout.header_offset
            ..self.layout.header_offset + std::mem::size_of::<ShmHeader>()];
        let mut header = ShmHeader::read_from_bytes(header_bytes).unwrap_or_default();
        header.device_count = count;
        header_bytes.copy_from_slice(header.as_bytes());
    }

    fn swapchain_descriptor_index(client_id: u32, swapchain_id: u32) -> usize {
        client_id as usize * MAX_SWAPCHAINS + swapchain_id as usize
    }

    fn swapchain_descriptor_bytes(&self, client_id: u32, swapchain_id: u32) -> &[u8] {
        let index = Self::swapchain_descriptor_index(client_id, swapchain_id);
        let start = self.layout.swapchain_table_offset
            + index * std::mem::size_of::<SwapchainDescriptorRaw>();
        &self.map[start..start + std::mem::size_of::<SwapchainDescriptorRaw>()]
    }

    fn swapchain_descriptor_bytes_mut(&mut self, client_id: u32, swapchain_id: u32) -> &mut [u8] {
        let index = Self::swapchain_descriptor_index(client_id, swapchain_id);
        let start = self.layout.swapchain_table_offset
            + index * std::mem::size_of::<SwapchainDescriptorRaw>();
        &mut self.map[start..start + std::mem::size_of::<SwapchainDescriptorRaw>()]
    }

    pub fn write_swapchain_descriptor(
        &mut self,
        client_id: u32,
        swapchain_id: u32,
        desc: &SwapchainDescriptorRaw,
    ) {
        self.swapchain_descriptor_bytes_mut(client_id, swapchain_id)
            .copy_from_slice(desc.as_bytes());
    }

    pub fn read_swapchain_descriptor(
        &self,
        client_id: u32,
        swapchain_id: u32,
    ) -> SwapchainDescriptorRaw {
        SwapchainDescriptorRaw::read_from_bytes(self.swapchain_descriptor_bytes(client_id, swapchain_id))
            .unwrap()
    }

    /// Marks a swapchain's descriptor slot inactive on `swapchain_destroy`
    /// (spec §4.E.4), rather than leaving stale metadata visible.
    pub fn clear_swapchain_descriptor(&mut self, client_id: u32, swapchain_id: u32) {
        self.write_swapchain_descriptor(client_id, swapchain_id, &SwapchainDescriptorRaw::default());
    }
}
