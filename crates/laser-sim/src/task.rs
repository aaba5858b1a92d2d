//! Virtual controller actor task
//!
//! Drives a [`VirtualController`] over any async byte stream with a select!
//! loop that:
//! - reads command frames from the stream and applies them
//! - writes replies back, optionally after a configured delay
//! - handles control commands (delay, mute, noise injection, shutdown)
//! - broadcasts a state snapshot after every applied batch of commands

use std::collections::VecDeque;
use std::io;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{broadcast, mpsc};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use crate::controller::{ControllerState, VirtualController};

/// Commands that can be sent to a virtual controller task
#[derive(Debug, Clone)]
pub enum VirtualControllerCommand {
    /// Hold every reply back for this long
    SetResponseDelay(Duration),
    /// Swallow replies instead of sending them
    SetMuted(bool),
    /// Write raw bytes to the stream right away
    InjectNoise(Vec<u8>),
    /// Shutdown the virtual controller task
    Shutdown,
}

/// Run the virtual controller task
///
/// Replies keep the order of their commands even when the response delay is
/// changed between them.
pub async fn run_virtual_controller_task<S>(
    mut stream: S,
    mut controller: VirtualController,
    mut cmd_rx: mpsc::Receiver<VirtualControllerCommand>,
    state_tx: broadcast::Sender<ControllerState>,
) -> io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut buf = [0u8; 256];
    let mut response_delay = Duration::ZERO;
    let mut muted = false;
    let mut scheduled: VecDeque<(Instant, Vec<u8>)> = VecDeque::new();

    info!("Starting virtual controller task for {}", controller.id());
    let _ = state_tx.send(controller.state());

    loop {
        let next_due = scheduled.front().map(|(due, _)| *due);

        tokio::select! {
            result = stream.read(&mut buf) => {
                match result {
                    Ok(0) => {
                        debug!("Virtual controller stream closed for {}", controller.id());
                        break;
                    }
                    Ok(n) => {
                        debug!(
                            "Virtual controller {} received {} bytes: {:02X?}",
                            controller.id(), n, &buf[..n]
                        );
                        if controller.push_bytes(&buf[..n]) > 0 {
                            let _ = state_tx.send(controller.state());
                        }

                        while let Some(reply) = controller.take_output() {
                            if muted {
                                debug!("Virtual controller {} muted, dropping {:02X?}", controller.id(), reply);
                                continue;
                            }
                            let earliest = scheduled.back().map(|(due, _)| *due);
                            let due = (Instant::now() + response_delay).max(earliest.unwrap_or_else(Instant::now));
                            scheduled.push_back((due, reply));
                        }
                    }
                    Err(e) => {
                        warn!("Virtual controller {} stream error: {}", controller.id(), e);
                        return Err(e);
                    }
                }
            }

            _ = sleep_until(next_due.unwrap_or_else(Instant::now)), if next_due.is_some() => {
                if let Some((_, reply)) = scheduled.pop_front() {
                    debug!("Virtual controller {} sending {:02X?}", controller.id(), reply);
                    stream.write_all(&reply).await?;
                    stream.flush().await?;
                }
            }

            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(VirtualControllerCommand::SetResponseDelay(delay)) => {
                        info!("Virtual controller {} response delay set to {:?}", controller.id(), delay);
                        response_delay = delay;
                    }
                    Some(VirtualControllerCommand::SetMuted(value)) => {
                        info!("Virtual controller {} muted: {}", controller.id(), value);
                        muted = value;
                    }
                    Some(VirtualControllerCommand::InjectNoise(bytes)) => {
                        debug!("Virtual controller {} injecting {:02X?}", controller.id(), bytes);
                        stream.write_all(&bytes).await?;
                        stream.flush().await?;
                    }
                    Some(VirtualControllerCommand::Shutdown) => {
                        info!("Shutdown requested for virtual controller {}", controller.id());
                        break;
                    }
                    None => {
                        debug!("Command channel closed for virtual controller {}", controller.id());
                        break;
                    }
                }
            }
        }
    }

    info!("Virtual controller task ended for {}", controller.id());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn read_exact(stream: &mut tokio::io::DuplexStream, len: usize) -> Vec<u8> {
        let mut buf = vec![0u8; len];
        tokio::time::timeout(Duration::from_millis(100), stream.read_exact(&mut buf))
            .await
            .unwrap()
            .unwrap();
        buf
    }

    #[tokio::test]
    async fn test_replies_to_version_query() {
        let (mut host, device) = tokio::io::duplex(256);
        let (cmd_tx, cmd_rx) = mpsc::channel(8);
        let (state_tx, _state_rx) = broadcast::channel(8);

        let task = tokio::spawn(run_virtual_controller_task(
            device,
            VirtualController::new("Test"),
            cmd_rx,
            state_tx,
        ));

        host.write_all(&[0x00]).await.unwrap();
        assert_eq!(read_exact(&mut host, 2).await, vec![1, 2]);

        cmd_tx.send(VirtualControllerCommand::Shutdown).await.unwrap();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_state_broadcast_after_commands() {
        let (mut host, device) = tokio::io::duplex(256);
        let (_cmd_tx, cmd_rx) = mpsc::channel(8);
        let (state_tx, mut state_rx) = broadcast::channel(8);

        let task = tokio::spawn(run_virtual_controller_task(
            device,
            VirtualController::new("Test"),
            cmd_rx,
            state_tx,
        ));

        // Initial snapshot
        assert!(!state_rx.recv().await.unwrap().power);

        host.write_all(&[0x01, 0x01]).await.unwrap();
        let state = tokio::time::timeout(Duration::from_millis(100), state_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(state.power);

        drop(host);
        task.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_response_delay_keeps_order() {
        let (mut host, device) = tokio::io::duplex(256);
        let (cmd_tx, cmd_rx) = mpsc::channel(8);
        let (state_tx, mut state_rx) = broadcast::channel(8);

        let _task = tokio::spawn(run_virtual_controller_task(
            device,
            VirtualController::new("Test"),
            cmd_rx,
            state_tx,
        ));
        let _ = state_rx.recv().await;

        cmd_tx
            .send(VirtualControllerCommand::SetResponseDelay(Duration::from_secs(2)))
            .await
            .unwrap();
        // Let the task pick the command up before time moves
        tokio::time::sleep(Duration::from_millis(1)).await;
        let start = Instant::now();
        host.write_all(&[0x02]).await.unwrap();
        let _ = state_rx.recv().await;

        cmd_tx
            .send(VirtualControllerCommand::SetResponseDelay(Duration::ZERO))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(1)).await;
        host.write_all(&[0x00]).await.unwrap();

        let mut buf = [0u8; 3];
        host.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, [0, 1, 2]);
        assert!(start.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_muted_controller_stays_silent() {
        let (mut host, device) = tokio::io::duplex(256);
        let (cmd_tx, cmd_rx) = mpsc::channel(8);
        let (state_tx, mut state_rx) = broadcast::channel(8);

        let _task = tokio::spawn(run_virtual_controller_task(
            device,
            VirtualController::new("Test"),
            cmd_rx,
            state_tx,
        ));
        let _ = state_rx.recv().await;

        cmd_tx.send(VirtualControllerCommand::SetMuted(true)).await.unwrap();
        cmd_tx
            .send(VirtualControllerCommand::InjectNoise(vec![0xEE]))
            .await
            .unwrap();
        // Noise arrives, the muted reply does not
        assert_eq!(read_exact(&mut host, 1).await, vec![0xEE]);

        host.write_all(&[0x00]).await.unwrap();
        let _ = state_rx.recv().await;
        let mut buf = [0u8; 1];
        let silent = tokio::time::timeout(Duration::from_millis(50), host.read(&mut buf)).await;
        assert!(silent.is_err());
    }
}
