//! Client operations: the public surface of a [`Session`].

use std::path::Path;

use obex_msg::{Request, TARGET_FBS, TARGET_S45};

use crate::event::Event;
use crate::path;
use crate::session::Session;
use crate::{Error, Result};

impl Session {
    /// Opens the link and performs the OBEX CONNECT handshake. The S45
    /// folder service is preferred; when the server refuses that target the
    /// generic folder-browsing UUID is tried before giving up.
    pub fn connect(&mut self) -> Result<()> {
        self.emit(Event::Connecting);
        if let Err(err) = self.transport_connect() {
            self.emit(Event::Err("connect"));
            return Err(err);
        }

        let mut result = self.run_request("connect", Request::connect(&TARGET_S45));
        if result.is_err() {
            self.emit(Event::Err("UUID"));
            result = self.run_request("connect", Request::connect(&TARGET_FBS));
        }
        match result {
            Ok(()) => {
                self.emit(Event::Ok(""));
                Ok(())
            }
            Err(err) => {
                self.emit(Event::Err("target"));
                Err(err)
            }
        }
    }

    /// OBEX DISCONNECT. The link itself stays up until the session closes.
    pub fn disconnect(&mut self) -> Result<()> {
        self.emit(Event::Disconnecting);
        let result = self.run_request("disconnect", Request::disconnect());
        match &result {
            Ok(()) => self.emit(Event::Ok("")),
            Err(_) => self.emit(Event::Err("disconnect")),
        }
        result
    }

    /// Fetches `remote` into the file at `local`, or into the in-memory
    /// buffer (see [`body`][Self::body]) when `local` is `None`.
    pub fn get(&mut self, local: Option<&Path>, remote: &str) -> Result<()> {
        if remote.is_empty() {
            return Err(Error::InvalidArgument("remote name must not be empty"));
        }
        self.emit(Event::Receiving(remote));
        let trimmed = remote.trim_start_matches('/');
        self.set_target(local, false);
        let result = self.run_request("get", Request::get_file(trimmed));
        self.finish_op(result, remote)
    }

    /// Fetches the folder listing of `remote` (empty for the root) into
    /// `local` or the in-memory buffer.
    pub fn list(&mut self, local: Option<&Path>, remote: &str) -> Result<()> {
        self.emit(Event::Receiving(remote));
        let trimmed = remote.trim_start_matches('/');
        self.set_target(local, true);
        let result = self.run_request("list", Request::get_listing(trimmed));
        self.finish_op(result, remote)
    }

    /// Folder listing kept in memory. The returned view stays valid until
    /// the next body-receiving operation on this session.
    pub fn fast_list(&mut self, remote: &str) -> Result<&[u8]> {
        self.emit(Event::Receiving(remote));
        let trimmed = remote.trim_start_matches('/');
        self.set_target(None, true);
        let result = self.run_request("list", Request::get_listing(trimmed));
        self.finish_op(result, remote)?;
        Ok(self.body().unwrap_or(&[]))
    }

    /// Streams the local file to the server under the name `remote`.
    pub fn put_file(&mut self, local: &Path, remote: &str) -> Result<()> {
        let tag = local.to_string_lossy().into_owned();
        self.emit(Event::Sending(&tag));
        let result = self.start_put(local, remote);
        self.finish_op(result, &tag)
    }

    fn start_put(&mut self, local: &Path, remote: &str) -> Result<()> {
        let file = std::fs::File::open(local)?;
        let size = file.metadata()?.len();
        self.set_source(file);
        self.run_request(
            "put",
            Request::put(remote, u32::try_from(size).unwrap_or(u32::MAX)),
        )
    }

    /// Deletes `remote` by sending a PUT without a body.
    pub fn del(&mut self, remote: &str) -> Result<()> {
        self.emit(Event::Sending(remote));
        let result = self.run_request("delete", Request::delete(remote));
        self.finish_op(result, remote)
    }

    /// Renames `src` to `dst` in the current server folder.
    pub fn rename(&mut self, src: &str, dst: &str) -> Result<()> {
        self.emit(Event::Sending(src));
        let result = self.run_request("rename", Request::rename(src, dst));
        self.finish_op(result, src)
    }

    /// Changes the server's working folder. `Some(path)` descends one
    /// SETPATH per component and halts on the first refusal; `None` (or an
    /// empty path) pops one level.
    pub fn setpath(&mut self, name: Option<&str>) -> Result<()> {
        let tag = name.unwrap_or("");
        self.emit(Event::Sending(tag));
        let mut result = Ok(());
        match name {
            Some(p) if !p.is_empty() => {
                for component in path::components(p) {
                    self.emit(Event::Sending(component));
                    result = self.run_request("setpath", Request::setpath_down(component));
                    if result.is_err() {
                        break;
                    }
                }
            }
            _ => result = self.run_request("setpath", Request::setpath_up()),
        }
        self.finish_op(result, tag)
    }

    /// Asks the device for an info value; the decoded number arrives as an
    /// INFO event.
    pub fn info(&mut self, opcode: u8) -> Result<()> {
        self.emit(Event::Receiving("info"));
        self.set_target(None, false);
        let result = self.run_request("info", Request::get_info(opcode));
        self.finish_op(result, "info")
    }

    /// Sends a file, or a whole directory tree rooted at `name`. The
    /// process working directory is moved during a tree send and restored
    /// before returning.
    pub fn put(&mut self, name: &Path) -> Result<()> {
        let origdir = std::env::current_dir()?;
        let meta = std::fs::metadata(name)?;

        let result = if meta.is_dir() {
            self.put_directory(name)
        } else {
            match name.file_name().and_then(|n| n.to_str()) {
                Some(remote) => self.put_file(name, remote),
                None => Err(Error::InvalidArgument("file name is not valid UTF-8")),
            }
        };

        let restored = std::env::set_current_dir(&origdir).map_err(Error::from);
        result.and(restored)
    }

    fn put_directory(&mut self, dir: &Path) -> Result<()> {
        std::env::set_current_dir(dir)?;
        let resolved = std::env::current_dir()?;

        let mut descended = false;
        if let Some(dirname) = resolved.file_name().and_then(|n| n.to_str()) {
            if !dirname.is_empty() {
                self.setpath(Some(dirname))?;
                descended = true;
            }
        }

        let walked = self.visit_dir(Path::new("."));
        let popped = if descended { self.setpath(None) } else { Ok(()) };
        walked.and(popped)
    }

    /// Walks one directory level in name order: files are sent, folders are
    /// entered with SETPATH and left again afterwards.
    fn visit_dir(&mut self, dir: &Path) -> Result<()> {
        let mut entries = std::fs::read_dir(dir)?.collect::<std::io::Result<Vec<_>>>()?;
        entries.sort_by_key(|e| e.file_name());

        for entry in entries {
            let file_type = entry.file_type()?;
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                log::warn!("skipping non-UTF-8 entry {:?}", entry.path());
                continue;
            };
            if file_type.is_dir() {
                self.setpath(Some(name))?;
                self.visit_dir(&entry.path())?;
                self.setpath(None)?;
            } else if file_type.is_file() {
                self.put_file(&entry.path(), name)?;
            }
        }
        Ok(())
    }
}
