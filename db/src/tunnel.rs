//! SSH port forwarding through the system OpenSSH client.

use std::io::Read;
use std::net::{Ipv4Addr, SocketAddr, TcpListener, TcpStream};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use wait_timeout::ChildExt;

use crate::config::SshConfig;
use crate::DbError;

/// How often the local end of the tunnel is probed while it comes up.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How long a stopped `ssh` process gets to exit after being killed.
const STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// A running `ssh -N -L` process forwarding a local port to a remote address.
///
/// The process is stopped when the tunnel is dropped.
#[derive(Debug)]
pub struct SshTunnel {
    child: Option<Child>,
    local_port: u16,
}

impl SshTunnel {
    /// Starts forwarding a free local port to `remote_host:remote_port` as seen
    /// from the SSH host, and waits until the local port accepts connections.
    pub fn open(ssh: &SshConfig, remote_host: &str, remote_port: u16) -> Result<SshTunnel, DbError> {
        let local_port = free_local_port()?;
        let args = forward_args(ssh, local_port, remote_host, remote_port);

        debug!("Starting {} {}", ssh.program, args.join(" "));
        let child = Command::new(&ssh.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| DbError::Tunnel {
                cause: format!("could not start {}: {}", ssh.program, e),
            })?;

        let mut tunnel = SshTunnel {
            child: Some(child),
            local_port,
        };
        tunnel.wait_until_ready(ssh.connect_timeout())?;
        info!(
            "SSH tunnel 127.0.0.1:{} -> {}:{} via {}@{}",
            local_port, remote_host, remote_port, ssh.user, ssh.host
        );

        Ok(tunnel)
    }

    /// The forwarded port on 127.0.0.1.
    pub fn local_port(&self) -> u16 {
        self.local_port
    }

    /// Stops the `ssh` process. Calling it again does nothing.
    pub fn stop(&mut self) {
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill() {
                debug!("ssh already exited: {}", e);
            }
            match child.wait_timeout(STOP_TIMEOUT) {
                Ok(Some(status)) => info!("SSH tunnel on port {} stopped ({})", self.local_port, status),
                Ok(None) => warn!("ssh did not exit within {:?}", STOP_TIMEOUT),
                Err(e) => warn!("Could not reap ssh: {}", e),
            }
        }
    }

    fn wait_until_ready(&mut self, timeout: Duration) -> Result<(), DbError> {
        let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, self.local_port));
        let started = Instant::now();

        loop {
            let exited = match self.child.as_mut() {
                Some(child) => child.try_wait().map_err(|e| DbError::Tunnel {
                    cause: e.to_string(),
                })?,
                None => {
                    return Err(DbError::Tunnel {
                        cause: "tunnel was already stopped".to_string(),
                    })
                }
            };

            if let Some(status) = exited {
                let stderr = self.take_stderr();
                self.child = None;
                return Err(DbError::Tunnel {
                    cause: format!("ssh exited with {}: {}", status, stderr.trim()),
                });
            }

            if TcpStream::connect_timeout(&addr, POLL_INTERVAL).is_ok() {
                return Ok(());
            }

            if started.elapsed() >= timeout {
                self.stop();
                return Err(DbError::Tunnel {
                    cause: format!(
                        "port {} was not forwarded within {:?}",
                        self.local_port, timeout
                    ),
                });
            }

            thread::sleep(POLL_INTERVAL);
        }
    }

    fn take_stderr(&mut self) -> String {
        let mut output = String::new();
        if let Some(stderr) = self.child.as_mut().and_then(|c| c.stderr.as_mut()) {
            if let Err(e) = stderr.read_to_string(&mut output) {
                debug!("Could not read ssh stderr: {}", e);
            }
        }
        output
    }
}

impl Drop for SshTunnel {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Arguments for a forward-only `ssh` invocation.
fn forward_args(ssh: &SshConfig, local_port: u16, remote_host: &str, remote_port: u16) -> Vec<String> {
    vec![
        "-N".to_string(),
        "-o".to_string(),
        "BatchMode=yes".to_string(),
        "-o".to_string(),
        "ExitOnForwardFailure=yes".to_string(),
        "-o".to_string(),
        format!("ConnectTimeout={}", ssh.connect_timeout_secs.max(1)),
        "-p".to_string(),
        ssh.port.to_string(),
        "-i".to_string(),
        ssh.private_key.display().to_string(),
        "-L".to_string(),
        format!("127.0.0.1:{}:{}:{}", local_port, remote_host, remote_port),
        format!("{}@{}", ssh.user, ssh.host),
    ]
}

/// Asks the OS for a port that is free right now.
fn free_local_port() -> Result<u16, DbError> {
    TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
        .and_then(|listener| listener.local_addr())
        .map(|addr| addr.port())
        .map_err(|e| DbError::Tunnel {
            cause: format!("no free local port: {}", e),
        })
}
