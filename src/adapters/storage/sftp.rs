//! SFTP session over `ssh2`, compiled with the `sftp` feature

use super::remote::{RemoteSession, SessionConnector};
use crate::config::RemoteStorageConfig;
use crate::domain::{Result, StorageError};
use secrecy::ExposeSecret;
use ssh2::{ErrorCode, RenameFlags, Session, Sftp};
use std::io::{Read, Write};
use std::net::TcpStream;
use std::path::{Path, PathBuf};

// libssh2 LIBSSH2_FX_NO_SUCH_FILE
const SFTP_NO_SUCH_FILE: i32 = 2;

/// Opens password-authenticated SFTP sessions
pub struct SftpConnector {
    host: String,
    port: u16,
    username: String,
    password: String,
}

impl SftpConnector {
    pub fn from_config(config: &RemoteStorageConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            username: config.username.clone(),
            password: config
                .password
                .as_ref()
                .map(|p| p.expose_secret().as_ref().to_string())
                .unwrap_or_default(),
        }
    }
}

fn connection_failed(e: impl std::fmt::Display) -> StorageError {
    StorageError::ConnectionFailed(e.to_string())
}

impl SessionConnector for SftpConnector {
    fn connect(&self) -> Result<Box<dyn RemoteSession>> {
        let tcp = TcpStream::connect((self.host.as_str(), self.port)).map_err(connection_failed)?;
        let mut session = Session::new().map_err(connection_failed)?;
        session.set_tcp_stream(tcp);
        session.handshake().map_err(connection_failed)?;
        session
            .userauth_password(&self.username, &self.password)
            .map_err(connection_failed)?;
        let sftp = session.sftp().map_err(connection_failed)?;

        tracing::debug!(host = %self.host, port = self.port, "SFTP session established");
        Ok(Box::new(SftpSession {
            _session: session,
            sftp,
        }))
    }

    fn describe(&self) -> String {
        format!("sftp://{}@{}:{}", self.username, self.host, self.port)
    }
}

/// One live SFTP channel; the SSH session is held so it outlives the channel
pub struct SftpSession {
    _session: Session,
    sftp: Sftp,
}

fn io_failure(path: &Path, e: ssh2::Error, write: bool) -> StorageError {
    let path = path.display().to_string();
    if e.code() == ErrorCode::SFTP(SFTP_NO_SUCH_FILE) {
        return StorageError::NotFound(path);
    }
    if write {
        StorageError::WriteFailed {
            path,
            message: e.to_string(),
        }
    } else {
        StorageError::ReadFailed {
            path,
            message: e.to_string(),
        }
    }
}

impl RemoteSession for SftpSession {
    fn exists(&mut self, path: &Path) -> Result<bool> {
        match self.sftp.stat(path) {
            Ok(_) => Ok(true),
            Err(e) if e.code() == ErrorCode::SFTP(SFTP_NO_SUCH_FILE) => Ok(false),
            Err(e) => Err(io_failure(path, e, false).into()),
        }
    }

    fn read_dir(&mut self, path: &Path) -> Result<Vec<(PathBuf, bool)>> {
        let entries = self.sftp.readdir(path).map_err(|e| match io_failure(path, e, false) {
            StorageError::ReadFailed { path, message } => StorageError::ListFailed { path, message },
            other => other,
        })?;
        Ok(entries
            .into_iter()
            .map(|(p, stat)| (p, stat.is_dir()))
            .collect())
    }

    fn read_file(&mut self, path: &Path) -> Result<Vec<u8>> {
        let mut file = self.sftp.open(path).map_err(|e| io_failure(path, e, false))?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf).map_err(|e| StorageError::ReadFailed {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Ok(buf)
    }

    fn write_file(&mut self, path: &Path, data: &[u8]) -> Result<()> {
        let mut file = self.sftp.create(path).map_err(|e| io_failure(path, e, true))?;
        file.write_all(data).map_err(|e| StorageError::WriteFailed {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Ok(())
    }

    fn rename(&mut self, from: &Path, to: &Path) -> Result<()> {
        let flags = RenameFlags::OVERWRITE | RenameFlags::ATOMIC | RenameFlags::NATIVE;
        self.sftp
            .rename(from, to, Some(flags))
            .map_err(|e| io_failure(to, e, true).into())
    }

    fn mkdir(&mut self, path: &Path) -> Result<()> {
        self.sftp
            .mkdir(path, 0o755)
            .map_err(|e| io_failure(path, e, true).into())
    }

    fn remove_file(&mut self, path: &Path) -> Result<()> {
        self.sftp
            .unlink(path)
            .map_err(|e| io_failure(path, e, true).into())
    }
}
