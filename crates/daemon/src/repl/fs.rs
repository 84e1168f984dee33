// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Board filesystem operations, carried out by small scripts on the board.
//!
//! Scripts report `OSError`s as a line starting with `__ERROR__:` instead of
//! raising, so the message arrives without a traceback.

use base64::prelude::BASE64_STANDARD;
use base64::Engine as _;
use mpr_core::normalize_core;
use mpr_wire::{DfInfo, FileEntry, MemInfo};

use super::{Cancel, Console, ReplEngine, ReplError, Transport, ERROR_PREFIX};

/// Bytes the board reads per `get` script.
pub const GET_CHUNK: usize = 12 * 1024;
/// Bytes per chunk the board writes for `put`.
pub const PUT_CHUNK: usize = 4 * 1024;
/// Chunks sent per `put` script.
pub const PUT_BATCH: usize = 4;

/// Python string literal for `s`; JSON string escapes are valid Python.
fn py_str(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| format!("'{}'", s.replace('\'', "\\'")))
}

fn py_bool(b: bool) -> &'static str {
    if b {
        "True"
    } else {
        "False"
    }
}

pub(crate) fn ls_script(path: &str, recursive: bool) -> String {
    format!(
        "import os
def _ls(p, r):
    for e in os.ilistdir(p):
        f = p.rstrip('/') + '/' + e[0]
        d = e[1] & 0x4000
        s = 0 if d else (e[3] if len(e) > 3 else os.stat(f)[6])
        print('D' if d else 'F', s, f)
        if r and d:
            _ls(f, r)
try:
    _ls({path}, {recursive})
except OSError as e:
    print('{ERROR_PREFIX}', e)
",
        path = py_str(path),
        recursive = py_bool(recursive),
    )
}

pub(crate) fn stat_script(path: &str) -> String {
    format!(
        "import os
try:
    s = os.stat({path})
    print('D' if s[0] & 0x4000 else 'F', s[6], {path})
except OSError as e:
    print('{ERROR_PREFIX}', e)
",
        path = py_str(path),
    )
}

pub(crate) fn cat_script(path: &str) -> String {
    format!(
        "try:
    with open({path}) as f:
        while True:
            c = f.read(256)
            if not c:
                break
            print(c, end='')
except OSError as e:
    print('{ERROR_PREFIX}', e)
",
        path = py_str(path),
    )
}

fn get_open_script(path: &str) -> String {
    format!(
        "import os, ubinascii
try:
    _f = open({path}, 'rb')
    print(os.stat({path})[6])
except OSError as e:
    print('{ERROR_PREFIX}', e)
",
        path = py_str(path),
    )
}

fn get_chunk_script() -> String {
    format!("import ubinascii\nprint(ubinascii.b2a_base64(_f.read({GET_CHUNK})).decode().strip())\n")
}

fn put_open_script(path: &str) -> String {
    format!(
        "try:
    _f = open({path}, 'wb')
except OSError as e:
    print('{ERROR_PREFIX}', e)
",
        path = py_str(path),
    )
}

fn put_batch_script(chunks: &[&[u8]]) -> String {
    let mut script = String::from("import ubinascii\n");
    for chunk in chunks {
        script.push_str(&format!("_f.write(ubinascii.a2b_base64('{}'))\n", BASE64_STANDARD.encode(chunk)));
    }
    script
}

const CLOSE_SCRIPT: &str = "_f.close()\ndel _f\n";

pub(crate) fn rm_script(path: &str, recursive: bool) -> String {
    format!(
        "import os
def _rm(p, r):
    if os.stat(p)[0] & 0x4000:
        if not r:
            raise OSError(21)
        for e in os.ilistdir(p):
            _rm(p.rstrip('/') + '/' + e[0], r)
        os.rmdir(p)
    else:
        os.remove(p)
try:
    _rm({path}, {recursive})
except OSError as e:
    print('{ERROR_PREFIX}', e)
",
        path = py_str(path),
        recursive = py_bool(recursive),
    )
}

/// Copy on the board. A directory destination receives the source under
/// its own name. Prints the files and bytes copied.
pub(crate) fn cp_script(src: &str, dest: &str, recursive: bool) -> String {
    format!(
        "import os
_n = [0, 0]
def _isdir(p):
    try:
        return os.stat(p)[0] & 0x4000 != 0
    except OSError:
        return False
def _into(s, d):
    if _isdir(d):
        return d.rstrip('/') + '/' + s.rstrip('/').split('/')[-1]
    return d
def _cpf(s, d):
    with open(s, 'rb') as a:
        with open(d, 'wb') as b:
            c = a.read(512)
            while c:
                b.write(c)
                _n[1] += len(c)
                c = a.read(512)
    _n[0] += 1
def _cpr(s, d):
    try:
        os.mkdir(d)
    except OSError:
        pass
    for e in os.ilistdir(s):
        f = s.rstrip('/') + '/' + e[0]
        t = d.rstrip('/') + '/' + e[0]
        if e[1] & 0x4000:
            _cpr(f, t)
        else:
            _cpf(f, t)
try:
    if _isdir({src}):
        if not {recursive}:
            raise OSError(21)
        _cpr({src}, _into({src}, {dest}))
    else:
        _cpf({src}, _into({src}, {dest}))
    print(_n[0], _n[1])
except OSError as e:
    print('{ERROR_PREFIX}', e)
",
        src = py_str(src),
        dest = py_str(dest),
        recursive = py_bool(recursive),
    )
}

pub(crate) fn mv_script(src: &str, dest: &str) -> String {
    format!(
        "import os
try:
    d = {dest}
    try:
        if os.stat(d)[0] & 0x4000:
            d = d.rstrip('/') + '/' + {src}.rstrip('/').split('/')[-1]
    except OSError:
        pass
    os.rename({src}, d)
except OSError as e:
    print('{ERROR_PREFIX}', e)
",
        src = py_str(src),
        dest = py_str(dest),
    )
}

pub(crate) fn touch_script(path: &str) -> String {
    format!(
        "try:
    open({path}, 'a').close()
except OSError as e:
    print('{ERROR_PREFIX}', e)
",
        path = py_str(path),
    )
}

/// Create a directory unless it already exists.
fn ensure_dir_script(path: &str) -> String {
    format!(
        "import os
try:
    os.mkdir({path})
except OSError as e:
    if e.args[0] != 17:
        print('{ERROR_PREFIX}', e)
",
        path = py_str(path),
    )
}

/// Wipe and remount the board filesystem. `None` for cores without a
/// known procedure.
pub fn format_script(core: &str) -> Option<&'static str> {
    let script = match normalize_core(core).as_str() {
        "ESP32" => "import os\nos.fsformat('/flash')\n",
        "ESP32S3" | "ESP32C6" => {
            "import os\nfrom flashbdev import bdev\nos.umount('/')\nos.VfsLfs2.mkfs(bdev)\nos.mount(bdev, '/')\n"
        }
        "EFR32MG" => "import os\nos.format()\n",
        "RP2350" => "import os, rp2\nbdev = rp2.Flash()\nos.VfsFat.mkfs(bdev)\nos.mount(bdev, '/')\n",
        _ => return None,
    };
    Some(script)
}

fn simple_os_script(call: &str, path: &str) -> String {
    format!(
        "import os
try:
    os.{call}({path})
except OSError as e:
    print('{ERROR_PREFIX}', e)
",
        path = py_str(path),
    )
}

pub(crate) const MEM_SCRIPT: &str = "import gc\ngc.collect()\nprint(gc.mem_free(), gc.mem_alloc())\n";

pub(crate) fn df_script(root: &str) -> String {
    format!(
        "import os
try:
    s = os.statvfs({root})
    print(s[0] * s[2], s[0] * s[3])
except OSError as e:
    print('{ERROR_PREFIX}', e)
",
        root = py_str(root),
    )
}

/// Text output of a script, or the board's error line.
fn script_output(bytes: &[u8]) -> Result<String, ReplError> {
    let text = String::from_utf8_lossy(bytes).into_owned();
    match text.lines().find_map(|l| l.strip_prefix(ERROR_PREFIX)) {
        Some(message) => Err(ReplError::Remote(message.trim().to_string())),
        None => Ok(text),
    }
}

fn desync(what: &str, line: &str) -> ReplError {
    ReplError::Desync(format!("unexpected {what} line {line:?}"))
}

/// Parse `D|F <size> <path>` lines.
pub(crate) fn parse_entries(text: &str) -> Result<Vec<FileEntry>, ReplError> {
    text.lines().filter(|l| !l.trim().is_empty()).map(parse_entry).collect()
}

fn parse_entry(line: &str) -> Result<FileEntry, ReplError> {
    let mut parts = line.trim_end_matches('\r').splitn(3, ' ');
    let (Some(kind), Some(size), Some(path)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(desync("listing", line));
    };
    let is_dir = match kind {
        "D" => true,
        "F" => false,
        _ => return Err(desync("listing", line)),
    };
    let size = size.parse().map_err(|_| desync("listing", line))?;
    Ok(FileEntry { path: path.to_string(), size, is_dir })
}

fn parse_pair(text: &str, what: &str) -> Result<(u64, u64), ReplError> {
    let line = text.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or_default();
    let mut nums = line.split_whitespace().map(str::parse::<u64>);
    match (nums.next(), nums.next()) {
        (Some(Ok(a)), Some(Ok(b))) => Ok((a, b)),
        _ => Err(desync(what, line)),
    }
}

pub(crate) fn parse_mem(text: &str) -> Result<MemInfo, ReplError> {
    let (free, alloc) = parse_pair(text, "memory")?;
    Ok(MemInfo { free, alloc, total: free + alloc })
}

pub(crate) fn parse_df(text: &str) -> Result<DfInfo, ReplError> {
    let (total, free) = parse_pair(text, "statvfs")?;
    Ok(DfInfo { total, used: total.saturating_sub(free), free })
}

pub(crate) fn parse_size(text: &str) -> Result<usize, ReplError> {
    let line = text.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or_default();
    line.parse().map_err(|_| desync("size", line))
}

/// Decode one `get` chunk; an empty line is end of file.
pub(crate) fn decode_chunk(text: &str) -> Result<Vec<u8>, ReplError> {
    let encoded: String = text.lines().map(str::trim).collect();
    BASE64_STANDARD
        .decode(encoded)
        .map_err(|e| ReplError::TransferCorrupted(format!("bad base64 from board: {e}")))
}

/// A file or directory under a transferred tree, relative to its root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeItem {
    pub relative: String,
    /// File contents; `None` for a directory
    pub data: Option<Vec<u8>>,
}

/// Files and bytes moved by a tree operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub files: u64,
    pub bytes: u64,
}

fn join_remote(root: &str, relative: &str) -> String {
    format!("{}/{relative}", root.trim_end_matches('/'))
}

fn relative_to<'a>(root: &str, path: &'a str) -> &'a str {
    path.strip_prefix(root.trim_end_matches('/')).unwrap_or(path).trim_start_matches('/')
}

impl<T: Transport> ReplEngine<T> {
    fn run_script(&mut self, script: &str, cancel: &Cancel) -> Result<String, ReplError> {
        let out = self.exec_capture(script, cancel)?;
        script_output(&out)
    }

    pub fn ls(
        &mut self,
        path: &str,
        recursive: bool,
        cancel: &Cancel,
    ) -> Result<Vec<FileEntry>, ReplError> {
        let text = self.run_script(&ls_script(path, recursive), cancel)?;
        parse_entries(&text)
    }

    pub fn stat(&mut self, path: &str, cancel: &Cancel) -> Result<FileEntry, ReplError> {
        let text = self.run_script(&stat_script(path), cancel)?;
        let line = text.lines().find(|l| !l.trim().is_empty()).unwrap_or_default();
        parse_entry(line)
    }

    /// Stream a text file to `console`.
    pub fn cat(&mut self, path: &str, console: &mut dyn Console) -> Result<(), ReplError> {
        let mut tee = ErrorTee { inner: console, head: Vec::new(), passing: false };
        let limit = self.timeouts().command;
        self.exec(cat_script(path).as_bytes(), &mut tee, Some(limit))?;
        tee.finish()
    }

    /// Read a file one chunk per script, so no single script has to
    /// outlast the command timeout.
    pub fn get(&mut self, path: &str, cancel: &Cancel) -> Result<Vec<u8>, ReplError> {
        let size = parse_size(&self.run_script(&get_open_script(path), cancel)?)?;
        let fetched = self.get_chunks(size, cancel);
        let closed = self.run_script(CLOSE_SCRIPT, &Cancel::new());
        let data = fetched?;
        closed?;
        Ok(data)
    }

    fn get_chunks(&mut self, size: usize, cancel: &Cancel) -> Result<Vec<u8>, ReplError> {
        let mut data = Vec::with_capacity(size);
        while data.len() < size {
            let chunk = decode_chunk(&self.run_script(&get_chunk_script(), cancel)?)?;
            if chunk.is_empty() {
                break;
            }
            data.extend_from_slice(&chunk);
        }
        if data.len() != size {
            return Err(ReplError::TransferCorrupted(format!(
                "expected {size} bytes, received {}",
                data.len()
            )));
        }
        Ok(data)
    }

    /// Write `data` to `path`, then confirm the size on the board.
    pub fn put(&mut self, path: &str, data: &[u8], cancel: &Cancel) -> Result<u64, ReplError> {
        self.run_script(&put_open_script(path), cancel)?;
        let chunks: Vec<&[u8]> = data.chunks(PUT_CHUNK).collect();
        for batch in chunks.chunks(PUT_BATCH) {
            if let Err(e) = self.run_script(&put_batch_script(batch), cancel) {
                let _ = self.run_script(CLOSE_SCRIPT, &Cancel::new());
                return Err(e);
            }
        }
        self.run_script(CLOSE_SCRIPT, cancel)?;
        let written = self.stat(path, cancel)?;
        if written.size != data.len() as u64 {
            return Err(ReplError::TransferCorrupted(format!(
                "board has {} bytes, sent {}",
                written.size,
                data.len()
            )));
        }
        Ok(written.size)
    }

    pub fn rm(&mut self, path: &str, recursive: bool, cancel: &Cancel) -> Result<(), ReplError> {
        self.run_script(&rm_script(path, recursive), cancel).map(|_| ())
    }

    pub fn mkdir(&mut self, path: &str, cancel: &Cancel) -> Result<(), ReplError> {
        self.run_script(&simple_os_script("mkdir", path), cancel).map(|_| ())
    }

    pub fn rmdir(&mut self, path: &str, cancel: &Cancel) -> Result<(), ReplError> {
        self.run_script(&simple_os_script("rmdir", path), cancel).map(|_| ())
    }

    pub fn cp(
        &mut self,
        src: &str,
        dest: &str,
        recursive: bool,
        cancel: &Cancel,
    ) -> Result<Tally, ReplError> {
        let text = self.run_script(&cp_script(src, dest, recursive), cancel)?;
        let (files, bytes) = parse_pair(&text, "copy")?;
        Ok(Tally { files, bytes })
    }

    pub fn mv(&mut self, src: &str, dest: &str, cancel: &Cancel) -> Result<(), ReplError> {
        self.run_script(&mv_script(src, dest), cancel).map(|_| ())
    }

    pub fn touch(&mut self, path: &str, cancel: &Cancel) -> Result<(), ReplError> {
        self.run_script(&touch_script(path), cancel).map(|_| ())
    }

    /// Run a script from [`format_script`].
    pub fn format(&mut self, script: &str, cancel: &Cancel) -> Result<(), ReplError> {
        self.run_script(script, cancel).map(|_| ())
    }

    /// Fetch every file under `root`. Directories come before their
    /// contents.
    pub fn get_tree(&mut self, root: &str, cancel: &Cancel) -> Result<Vec<TreeItem>, ReplError> {
        let entries = self.ls(root, true, cancel)?;
        let mut items = Vec::with_capacity(entries.len());
        for entry in entries {
            let relative = relative_to(root, &entry.path).to_string();
            let data = if entry.is_dir { None } else { Some(self.get(&entry.path, cancel)?) };
            items.push(TreeItem { relative, data });
        }
        Ok(items)
    }

    /// Recreate `items` under `root`, creating directories as needed.
    pub fn put_tree(
        &mut self,
        root: &str,
        items: &[TreeItem],
        cancel: &Cancel,
    ) -> Result<Tally, ReplError> {
        self.run_script(&ensure_dir_script(root), cancel)?;
        let mut tally = Tally::default();
        for item in items {
            let path = join_remote(root, &item.relative);
            match &item.data {
                None => {
                    self.run_script(&ensure_dir_script(&path), cancel)?;
                }
                Some(data) => {
                    tally.bytes += self.put(&path, data, cancel)?;
                    tally.files += 1;
                }
            }
        }
        Ok(tally)
    }

    pub fn mem(&mut self, cancel: &Cancel) -> Result<MemInfo, ReplError> {
        let text = self.run_script(MEM_SCRIPT, cancel)?;
        parse_mem(&text)
    }

    pub fn df(&mut self, root: &str, cancel: &Cancel) -> Result<DfInfo, ReplError> {
        let text = self.run_script(&df_script(root), cancel)?;
        parse_df(&text)
    }
}

/// Holds back the start of the output until it is clear whether the
/// script reported an error instead of file content.
struct ErrorTee<'a> {
    inner: &'a mut dyn Console,
    head: Vec<u8>,
    passing: bool,
}

impl ErrorTee<'_> {
    fn finish(self) -> Result<(), ReplError> {
        if self.passing {
            return Ok(());
        }
        script_output(&self.head)?;
        self.inner.stdout(&self.head);
        Ok(())
    }
}

impl Console for ErrorTee<'_> {
    fn stdout(&mut self, bytes: &[u8]) {
        if self.passing {
            self.inner.stdout(bytes);
            return;
        }
        self.head.extend_from_slice(bytes);
        let prefix = ERROR_PREFIX.as_bytes();
        let undecided = self.head.len() < prefix.len() && prefix.starts_with(&self.head);
        if !undecided && !self.head.starts_with(prefix) {
            self.passing = true;
            self.inner.stdout(&self.head);
            self.head.clear();
        }
    }

    fn cancelled(&self) -> bool {
        self.inner.cancelled()
    }
}

#[cfg(test)]
#[path = "fs_tests.rs"]
mod tests;
