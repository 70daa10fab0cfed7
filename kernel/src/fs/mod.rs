//! The read-only filesystem image: a boot block, a run of inodes, and a
//! run of 4 KiB data blocks, all packed into one multiboot module and
//! addressed by raw offsets rather than mounted through any path-based
//! VFS. This mirrors the source kernel's flat `boot_block_t` layout —
//! there are no directories beyond the single top-level listing.

use spin::Once;

use crate::error::KernelError;

pub const MAX_ENTRIES: usize = 63;
pub const MAX_NAME_CHARS: usize = 32;
pub const DENTRY_SIZE: usize = 64;
pub const DATA_BLOCK_SIZE: usize = 4096;
pub const MAX_INODE_DATA_BLOCKS: usize = 1023;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Rtc,
    Directory,
    Regular,
}

#[derive(Debug, Clone, Copy)]
pub struct Dentry {
    pub name: [u8; MAX_NAME_CHARS],
    pub name_len: usize,
    pub file_type: FileType,
    pub inode: u32,
}

impl Dentry {
    pub fn name_str(&self) -> &str {
        core::str::from_utf8(&self.name[..self.name_len]).unwrap_or("")
    }
}

struct Image {
    bytes: &'static [u8],
}

impl Image {
    fn num_entries(&self) -> usize {
        u32::from_le_bytes(self.bytes[0..4].try_into().unwrap()) as usize
    }

    fn num_inodes(&self) -> usize {
        u32::from_le_bytes(self.bytes[4..8].try_into().unwrap()) as usize
    }

    fn num_data_blocks(&self) -> usize {
        u32::from_le_bytes(self.bytes[8..12].try_into().unwrap()) as usize
    }

    fn dentry_at(&self, index: usize) -> Option<Dentry> {
        if index >= self.num_entries() {
            return None;
        }
        let offset = DATA_BLOCK_SIZE + index * DENTRY_SIZE;
        let raw = &self.bytes[offset..offset + DENTRY_SIZE];
        let name_len = raw[..MAX_NAME_CHARS]
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(MAX_NAME_CHARS);
        let mut name = [0u8; MAX_NAME_CHARS];
        name[..MAX_NAME_CHARS].copy_from_slice(&raw[..MAX_NAME_CHARS]);
        let raw_type = u32::from_le_bytes(raw[32..36].try_into().unwrap());
        let file_type = match raw_type {
            0 => FileType::Rtc,
            1 => FileType::Directory,
            _ => FileType::Regular,
        };
        let inode = u32::from_le_bytes(raw[36..40].try_into().unwrap());
        Some(Dentry {
            name,
            name_len,
            file_type,
            inode,
        })
    }

    fn inode_base(&self) -> usize {
        DATA_BLOCK_SIZE * (1 + MAX_ENTRIES)
    }

    fn inode_size(&self, inode: u32) -> Option<usize> {
        if inode as usize >= self.num_inodes() {
            return None;
        }
        let offset = self.inode_base() + inode as usize * DATA_BLOCK_SIZE;
        Some(u32::from_le_bytes(self.bytes[offset..offset + 4].try_into().unwrap()) as usize)
    }

    fn inode_block(&self, inode: u32, block_num: usize) -> Option<u32> {
        if block_num >= MAX_INODE_DATA_BLOCKS {
            return None;
        }
        let offset = self.inode_base() + inode as usize * DATA_BLOCK_SIZE + 4 + block_num * 4;
        Some(u32::from_le_bytes(
            self.bytes[offset..offset + 4].try_into().unwrap(),
        ))
    }

    fn data_block_base(&self) -> usize {
        self.inode_base() + self.num_inodes() * DATA_BLOCK_SIZE
    }
}

static IMAGE: Once<Image> = Once::new();

/// Install the filesystem image. `bytes` must outlive the kernel, which
/// holds for a multiboot module: the bootloader's memory reservation
/// keeps it mapped for the system's entire lifetime.
pub fn init(bytes: &'static [u8]) {
    IMAGE.call_once(|| Image { bytes });
}

fn image() -> &'static Image {
    IMAGE.get().expect("filesystem not initialized")
}

/// A space or a NUL in `name` ends it, matching `execute`'s own command
/// parsing: a caller handing over a space-terminated argument string
/// should find the same file a NUL-terminated one would.
fn trim_name(name: &[u8]) -> &[u8] {
    let end = name
        .iter()
        .position(|&b| b == b' ' || b == 0)
        .unwrap_or(name.len());
    &name[..end]
}

pub fn lookup_by_name(name: &[u8]) -> Option<Dentry> {
    let name = trim_name(name);
    let image = image();
    (0..image.num_entries())
        .filter_map(|i| image.dentry_at(i))
        .find(|d| d.name[..d.name_len] == *name)
}

pub fn lookup_by_index(index: u32) -> Option<Dentry> {
    image().dentry_at(index as usize)
}

pub fn entry_name(index: u32) -> Option<&'static str> {
    let image = image();
    if index as usize >= image.num_entries() {
        return None;
    }
    let offset = DATA_BLOCK_SIZE + index as usize * DENTRY_SIZE;
    let raw = &image.bytes[offset..offset + MAX_NAME_CHARS];
    let len = raw.iter().position(|&b| b == 0).unwrap_or(MAX_NAME_CHARS);
    core::str::from_utf8(&raw[..len]).ok()
}

pub fn file_size(inode: u32) -> Result<usize, KernelError> {
    image().inode_size(inode).ok_or(KernelError::ProgramNotFound)
}

/// Copy up to `buf.len()` bytes starting at `offset` into `buf`, returning
/// the number of bytes actually copied (0 at or past end of file).
pub fn read_data(inode: u32, offset: usize, buf: &mut [u8]) -> Result<usize, KernelError> {
    let image = image();
    let size = image.inode_size(inode).ok_or(KernelError::ProgramNotFound)?;
    if offset >= size {
        return Ok(0);
    }
    let to_read = buf.len().min(size - offset);
    let mut copied = 0;
    while copied < to_read {
        let file_pos = offset + copied;
        let block_num = file_pos / DATA_BLOCK_SIZE;
        let block_off = file_pos % DATA_BLOCK_SIZE;
        let block_index = image
            .inode_block(inode, block_num)
            .ok_or(KernelError::MalformedExecutable)?;
        if block_index as usize >= image.num_data_blocks() {
            return Err(KernelError::MalformedExecutable);
        }
        let block_start = image.data_block_base() + block_index as usize * DATA_BLOCK_SIZE;
        let chunk = (DATA_BLOCK_SIZE - block_off).min(to_read - copied);
        let src = &image.bytes[block_start + block_off..block_start + block_off + chunk];
        buf[copied..copied + chunk].copy_from_slice(src);
        copied += chunk;
    }
    Ok(copied)
}

#[cfg(test)]
mod tests {
    extern crate alloc;

    use alloc::{boxed::Box, vec};

    use super::*;

    fn build_image() -> alloc::vec::Vec<u8> {
        let mut bytes = vec![0u8; DATA_BLOCK_SIZE * 3];
        bytes[0..4].copy_from_slice(&1u32.to_le_bytes()); // 1 dentry
        bytes[4..8].copy_from_slice(&1u32.to_le_bytes()); // 1 inode
        bytes[8..12].copy_from_slice(&1u32.to_le_bytes()); // 1 data block

        let dentry_off = DATA_BLOCK_SIZE;
        bytes[dentry_off..dentry_off + 5].copy_from_slice(b"hello");
        bytes[dentry_off + 32..dentry_off + 36].copy_from_slice(&2u32.to_le_bytes()); // regular
        bytes[dentry_off + 36..dentry_off + 40].copy_from_slice(&0u32.to_le_bytes()); // inode 0

        let inode_off = DATA_BLOCK_SIZE * (1 + MAX_ENTRIES);
        bytes.resize(inode_off + DATA_BLOCK_SIZE * 2, 0);
        bytes[inode_off..inode_off + 4].copy_from_slice(&11u32.to_le_bytes()); // file_size
        bytes[inode_off + 4..inode_off + 8].copy_from_slice(&0u32.to_le_bytes()); // block 0 -> data block 0

        let data_off = inode_off + DATA_BLOCK_SIZE;
        bytes[data_off..data_off + 11].copy_from_slice(b"hello world");
        bytes
    }

    #[test]
    fn lookup_and_read_round_trip() {
        let owned = build_image();
        let leaked: &'static [u8] = Box::leak(owned.into_boxed_slice());
        let image = Image { bytes: leaked };
        let dentry = image.dentry_at(0).unwrap();
        assert_eq!(dentry.name_str(), "hello");
        assert_eq!(dentry.file_type, FileType::Regular);
        assert_eq!(image.inode_size(0), Some(11));

        IMAGE.call_once(|| Image { bytes: leaked });
        let mut buf = [0u8; 11];
        let n = read_data(0, 0, &mut buf).unwrap();
        assert_eq!(n, 11);
        assert_eq!(&buf, b"hello world");

        assert_eq!(lookup_by_name(b"hello world").unwrap().name_str(), "hello");
        assert_eq!(lookup_by_name(b"hello\0garbage").unwrap().name_str(), "hello");
    }

    #[test]
    fn trim_name_stops_at_space_or_nul() {
        assert_eq!(trim_name(b"cat file.txt"), b"cat");
        assert_eq!(trim_name(b"shell\0\0\0"), b"shell");
        assert_eq!(trim_name(b"noterminator"), b"noterminator");
    }
}
