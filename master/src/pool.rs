use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tracing::debug;

/// Pool de endpoints de workers compartido por las unidades de despacho.
///
/// - `register` es el lado productor: workers ya registrados al arrancar la
///   fase y los que se registran mientras corre.
/// - `acquire` bloquea hasta que haya un endpoint libre y lo entrega en
///   exclusiva como `WorkerLease`. Al soltar el lease el endpoint vuelve a la
///   cola (FIFO), sirva o no la llamada.
///
/// El pool es un valor explícito: cada job/test puede tener el suyo.
#[derive(Clone)]
pub struct WorkerPool {
    tx: mpsc::UnboundedSender<String>,
    rx: Arc<Mutex<mpsc::UnboundedReceiver<String>>>,
}

impl WorkerPool {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Arc::new(Mutex::new(rx)),
        }
    }

    #[cfg(test)]
    pub fn with_workers<I, S>(addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let pool = Self::new();
        for addr in addresses {
            pool.register(addr);
        }
        pool
    }

    /// Agrega un endpoint al pool (registro de un worker).
    pub fn register(&self, address: impl Into<String>) {
        // el receptor vive mientras viva cualquier clon del pool, así que no falla
        let _ = self.tx.send(address.into());
    }

    /// Toma un endpoint en exclusiva. Espera si no hay ninguno libre.
    pub async fn acquire(&self) -> WorkerLease {
        let mut rx = self.rx.lock().await;
        match rx.recv().await {
            Some(address) => {
                debug!("lease tomado sobre {}", address);
                WorkerLease {
                    address: Some(address),
                    pool: self.tx.clone(),
                }
            }
            // `self.tx` mantiene el canal abierto; si igual se cerrara, no hay
            // endpoint que entregar y la espera es para siempre
            None => std::future::pending().await,
        }
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new()
    }
}

/// Posesión exclusiva de un endpoint durante un intento de llamada.
/// Se devuelve al pool al hacer drop.
pub struct WorkerLease {
    address: Option<String>,
    pool: mpsc::UnboundedSender<String>,
}

impl WorkerLease {
    pub fn address(&self) -> &str {
        self.address.as_deref().unwrap_or_default()
    }
}

impl Drop for WorkerLease {
    fn drop(&mut self) {
        if let Some(address) = self.address.take() {
            debug!("devolviendo {} al pool", address);
            let _ = self.pool.send(address);
        }
    }
}
