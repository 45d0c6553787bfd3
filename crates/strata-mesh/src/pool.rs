//! A fixed set of reusable mesh builders shared between worker threads.
//!
//! Builders move between two lock-free queues: `available` holds idle
//! builders, `finished` holds builders whose output is waiting to be
//! uploaded. The uploader takes finished builders and releases them back to
//! `available` once the geometry has been copied out.

use crossbeam_channel::{Receiver, Sender, unbounded};

use crate::builder::ChunkMeshBuilder;

pub struct MeshBuilderPool {
    capacity: usize,
    available_tx: Sender<Box<ChunkMeshBuilder>>,
    available_rx: Receiver<Box<ChunkMeshBuilder>>,
    finished_tx: Sender<Box<ChunkMeshBuilder>>,
    finished_rx: Receiver<Box<ChunkMeshBuilder>>,
}

impl MeshBuilderPool {
    /// Creates a pool holding `capacity` idle builders.
    pub fn new(capacity: usize) -> Self {
        let (available_tx, available_rx) = unbounded();
        let (finished_tx, finished_rx) = unbounded();
        for _ in 0..capacity {
            // Receiver is alive, send cannot fail.
            let _ = available_tx.send(Box::new(ChunkMeshBuilder::new()));
        }
        tracing::debug!(capacity, "mesh builder pool created");
        Self {
            capacity,
            available_tx,
            available_rx,
            finished_tx,
            finished_rx,
        }
    }

    /// Takes an idle builder, or `None` if all are busy or awaiting upload.
    pub fn try_acquire(&self) -> Option<Box<ChunkMeshBuilder>> {
        self.available_rx.try_recv().ok()
    }

    /// Hands a builder with fresh output to the uploader.
    pub fn finish(&self, builder: Box<ChunkMeshBuilder>) {
        let _ = self.finished_tx.send(builder);
    }

    /// Takes the next builder awaiting upload.
    pub fn try_take_finished(&self) -> Option<Box<ChunkMeshBuilder>> {
        self.finished_rx.try_recv().ok()
    }

    /// Returns a builder to the idle queue.
    pub fn release(&self, mut builder: Box<ChunkMeshBuilder>) {
        builder.clear();
        let _ = self.available_tx.send(builder);
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available_len(&self) -> usize {
        self.available_rx.len()
    }

    pub fn finished_len(&self) -> usize {
        self.finished_rx.len()
    }
}
