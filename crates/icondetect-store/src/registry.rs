//! Live Windows registry backend.

use crate::{Access, KeyStore, StoreKey};
use icondetect_core::{Hive, StoreError, StoreResult};
use std::ptr;
use windows_sys::Win32::Foundation::{
    ERROR_ACCESS_DENIED, ERROR_FILE_NOT_FOUND, ERROR_MORE_DATA, ERROR_NO_MORE_ITEMS,
    ERROR_PATH_NOT_FOUND, ERROR_SUCCESS, WIN32_ERROR,
};
use windows_sys::Win32::System::Registry::{
    HKEY, HKEY_CLASSES_ROOT, HKEY_CURRENT_USER, HKEY_LOCAL_MACHINE, KEY_ALL_ACCESS, KEY_READ,
    REG_EXPAND_SZ, REG_OPTION_NON_VOLATILE, REG_SAM_FLAGS, REG_SZ, REG_VALUE_TYPE, RegCloseKey,
    RegCreateKeyExW, RegDeleteKeyW, RegEnumKeyExW, RegOpenKeyExW, RegQueryValueExW,
    RegSetValueExW,
};

/// Longest key name the registry allows, plus the terminator.
const MAX_KEY_NAME: usize = 256;

fn wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

fn check(code: WIN32_ERROR, path: &str) -> StoreResult<()> {
    match code {
        ERROR_SUCCESS => Ok(()),
        ERROR_FILE_NOT_FOUND | ERROR_PATH_NOT_FOUND => Err(StoreError::not_found(path)),
        ERROR_ACCESS_DENIED => Err(StoreError::access_denied(path)),
        code => Err(StoreError::Os {
            path: path.to_string(),
            code,
        }),
    }
}

fn sam(access: Access) -> REG_SAM_FLAGS {
    match access {
        Access::Read => KEY_READ,
        Access::All => KEY_ALL_ACCESS,
    }
}

/// [`KeyStore`] over one predefined registry root.
#[derive(Debug, Clone, Copy)]
pub struct RegistryStore {
    hive: Hive,
}

impl RegistryStore {
    pub fn new(hive: Hive) -> Self {
        Self { hive }
    }

    pub fn hive(&self) -> Hive {
        self.hive
    }

    fn root(&self) -> HKEY {
        match self.hive {
            Hive::LocalMachine => HKEY_LOCAL_MACHINE,
            Hive::ClassesRoot => HKEY_CLASSES_ROOT,
            Hive::CurrentUser => HKEY_CURRENT_USER,
        }
    }
}

impl KeyStore for RegistryStore {
    type Key = RegistryKey;

    fn open_key(&self, path: &str, access: Access) -> StoreResult<RegistryKey> {
        let subkey = wide(path);
        let mut hkey: HKEY = ptr::null_mut();
        // SAFETY: `subkey` is NUL terminated and outlives the call; `hkey` is a valid out pointer.
        let code = unsafe { RegOpenKeyExW(self.root(), subkey.as_ptr(), 0, sam(access), &mut hkey) };
        check(code, path)?;
        Ok(RegistryKey {
            hkey,
            path: path.to_string(),
        })
    }

    fn create_key(&self, path: &str) -> StoreResult<RegistryKey> {
        let subkey = wide(path);
        let mut hkey: HKEY = ptr::null_mut();
        // SAFETY: all pointers are either null (optional arguments) or point to live locals.
        let code = unsafe {
            RegCreateKeyExW(
                self.root(),
                subkey.as_ptr(),
                0,
                ptr::null(),
                REG_OPTION_NON_VOLATILE,
                KEY_ALL_ACCESS,
                ptr::null(),
                &mut hkey,
                ptr::null_mut(),
            )
        };
        check(code, path)?;
        Ok(RegistryKey {
            hkey,
            path: path.to_string(),
        })
    }

    fn delete_key(&self, path: &str) -> StoreResult<()> {
        let subkey = wide(path);
        // SAFETY: `subkey` is NUL terminated and outlives the call.
        let code = unsafe { RegDeleteKeyW(self.root(), subkey.as_ptr()) };
        check(code, path)
    }
}

/// Open registry key handle, closed on drop.
#[derive(Debug)]
pub struct RegistryKey {
    hkey: HKEY,
    path: String,
}

impl StoreKey for RegistryKey {
    fn path(&self) -> &str {
        &self.path
    }

    fn subkey_names(&self) -> StoreResult<Vec<String>> {
        let mut names = Vec::new();
        let mut buf = [0u16; MAX_KEY_NAME];
        for index in 0.. {
            let mut len = buf.len() as u32;
            // SAFETY: `buf` holds `len` u16s; unused optional outputs are null.
            let code = unsafe {
                RegEnumKeyExW(
                    self.hkey,
                    index,
                    buf.as_mut_ptr(),
                    &mut len,
                    ptr::null(),
                    ptr::null_mut(),
                    ptr::null_mut(),
                    ptr::null_mut(),
                )
            };
            if code == ERROR_NO_MORE_ITEMS {
                break;
            }
            check(code, &self.path)?;
            names.push(String::from_utf16_lossy(&buf[..len as usize]));
        }
        Ok(names)
    }

    fn get_string(&self, name: &str) -> StoreResult<String> {
        let value_name = wide(name);
        let mut kind: REG_VALUE_TYPE = 0;
        let mut size: u32 = 0;
        // SAFETY: a null data pointer asks only for type and size.
        let code = unsafe {
            RegQueryValueExW(
                self.hkey,
                value_name.as_ptr(),
                ptr::null(),
                &mut kind,
                ptr::null_mut(),
                &mut size,
            )
        };
        check(code, &self.path)?;
        if kind != REG_SZ && kind != REG_EXPAND_SZ {
            return Err(StoreError::WrongType {
                path: self.path.clone(),
            });
        }

        loop {
            let mut data = vec![0u16; (size as usize).div_ceil(2) + 1];
            let mut bytes = (data.len() * 2) as u32;
            // SAFETY: `data` holds `bytes` bytes of writable storage.
            let code = unsafe {
                RegQueryValueExW(
                    self.hkey,
                    value_name.as_ptr(),
                    ptr::null(),
                    &mut kind,
                    data.as_mut_ptr().cast(),
                    &mut bytes,
                )
            };
            if code == ERROR_MORE_DATA {
                size = bytes;
                continue;
            }
            check(code, &self.path)?;

            data.truncate(bytes as usize / 2);
            while data.last() == Some(&0) {
                data.pop();
            }
            return Ok(String::from_utf16_lossy(&data));
        }
    }

    fn set_string(&self, name: &str, value: &str) -> StoreResult<()> {
        let value_name = wide(name);
        let data = wide(value);
        // SAFETY: `data` is a NUL terminated UTF-16 buffer of the given byte length.
        let code = unsafe {
            RegSetValueExW(
                self.hkey,
                value_name.as_ptr(),
                0,
                REG_SZ,
                data.as_ptr().cast(),
                (data.len() * 2) as u32,
            )
        };
        check(code, &self.path)
    }
}

impl Drop for RegistryKey {
    fn drop(&mut self) {
        // SAFETY: `hkey` was returned by RegOpenKeyExW/RegCreateKeyExW and is closed once.
        let code = unsafe { RegCloseKey(self.hkey) };
        if code != ERROR_SUCCESS {
            log::debug!("RegCloseKey failed for {}: {}", self.path, code);
        }
    }
}
