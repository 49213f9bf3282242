//! Process Snapshot
//!
//! Lists the names of running processes. Processes that vanish or deny
//! access mid-query are simply left out.

use anyhow::Result;
use std::collections::HashSet;

/// Source of the running-process list, queried once per tick
pub trait ProcessSource: Send {
    fn running_process_names(&mut self) -> Result<HashSet<String>>;
}

/// One row of `list-processes`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ProcessEntry {
    pub pid: u32,
    pub name: String,
}

#[cfg(windows)]
pub use windows_impl::SystemProcesses;

#[cfg(not(windows))]
pub use sysinfo_impl::SystemProcesses;

#[cfg(windows)]
mod windows_impl {
    use super::{ProcessEntry, ProcessSource};
    use anyhow::{Context, Result};
    use std::collections::HashSet;
    use std::ffi::OsString;
    use std::os::windows::ffi::OsStringExt;
    use windows::Win32::Foundation::CloseHandle;
    use windows::Win32::System::Diagnostics::ToolHelp::{
        CreateToolhelp32Snapshot, Process32FirstW, Process32NextW, PROCESSENTRY32W,
        TH32CS_SNAPPROCESS,
    };

    /// Toolhelp32 process snapshot
    #[derive(Debug, Default)]
    pub struct SystemProcesses;

    impl SystemProcesses {
        pub fn new() -> Self {
            Self
        }

        pub fn entries(&mut self) -> Result<Vec<ProcessEntry>> {
            let mut out = Vec::new();
            unsafe {
                let handle = CreateToolhelp32Snapshot(TH32CS_SNAPPROCESS, 0)
                    .context("CreateToolhelp32Snapshot failed")?;
                if handle.is_invalid() {
                    anyhow::bail!("CreateToolhelp32Snapshot returned an invalid handle");
                }

                let mut entry = PROCESSENTRY32W {
                    dwSize: std::mem::size_of::<PROCESSENTRY32W>() as u32,
                    ..Default::default()
                };

                if Process32FirstW(handle, &mut entry).is_ok() {
                    loop {
                        // szExeFile is [u16; 260], NUL-terminated
                        let name_len = entry
                            .szExeFile
                            .iter()
                            .position(|&c| c == 0)
                            .unwrap_or(entry.szExeFile.len());
                        if name_len > 0 {
                            let name = OsString::from_wide(&entry.szExeFile[..name_len])
                                .to_string_lossy()
                                .to_string();
                            out.push(ProcessEntry {
                                pid: entry.th32ProcessID,
                                name,
                            });
                        }
                        if Process32NextW(handle, &mut entry).is_err() {
                            break;
                        }
                    }
                }
                let _ = CloseHandle(handle);
            }
            Ok(out)
        }
    }

    impl ProcessSource for SystemProcesses {
        fn running_process_names(&mut self) -> Result<HashSet<String>> {
            Ok(self.entries()?.into_iter().map(|e| e.name).collect())
        }
    }
}

#[cfg(not(windows))]
mod sysinfo_impl {
    use super::{ProcessEntry, ProcessSource};
    use anyhow::Result;
    use std::collections::HashSet;
    use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, System};

    /// sysinfo-backed process list
    pub struct SystemProcesses {
        system: System,
    }

    impl Default for SystemProcesses {
        fn default() -> Self {
            Self::new()
        }
    }

    impl SystemProcesses {
        pub fn new() -> Self {
            Self {
                system: System::new(),
            }
        }

        fn refresh(&mut self) {
            // Names only; dead processes are dropped from the table
            self.system
                .refresh_processes_specifics(ProcessesToUpdate::All, ProcessRefreshKind::new());
        }

        pub fn entries(&mut self) -> Result<Vec<ProcessEntry>> {
            self.refresh();
            Ok(self
                .system
                .processes()
                .iter()
                .map(|(pid, process)| ProcessEntry {
                    pid: pid.as_u32(),
                    name: process.name().to_string_lossy().to_string(),
                })
                .filter(|e| !e.name.is_empty())
                .collect())
        }
    }

    impl ProcessSource for SystemProcesses {
        fn running_process_names(&mut self) -> Result<HashSet<String>> {
            Ok(self.entries()?.into_iter().map(|e| e.name).collect())
        }
    }
}
