//! 维护到所有对等节点的连接
//!
//! 每个节点 id 至多一个连接句柄，首次使用时创建
//! 全局锁只保护 id 到槽位的映射，连接的创建在各自槽位的 OnceCell 中进行，
//! 不同节点的建连互不阻塞；同一节点的并发首次访问只会创建一次

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard,
    },
};

use futures::future::join_all;
use log::{debug, warn};
use tokio::sync::OnceCell;

use crate::{
    error::{Error, Result},
    protocol::RaftPeer,
    proxy::{ClientProtocol, ProxyFactory},
    PeerId,
};

struct PeerAndProxy<P> {
    peer: RaftPeer,
    /// 创建失败时保持为空，下次访问重新创建
    proxy: OnceCell<Arc<P>>,
    shut_down: AtomicBool,
}

impl<P> PeerAndProxy<P> {
    fn new(peer: RaftPeer) -> Self {
        Self {
            peer,
            proxy: OnceCell::new(),
            shut_down: AtomicBool::new(false),
        }
    }

    /// 已建立且还未关闭的连接，每个槽位至多返回一次
    fn take_for_shutdown(&self) -> Option<Arc<P>> {
        let proxy = self.proxy.get()?;
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return None;
        }
        Some(proxy.clone())
    }
}

pub struct PeerProxyMap<F: ProxyFactory> {
    factory: F,
    peers: Mutex<HashMap<PeerId, Arc<PeerAndProxy<F::Proxy>>>>,
    closed: AtomicBool,
}

impl<F: ProxyFactory> PeerProxyMap<F> {
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            peers: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<PeerId, Arc<PeerAndProxy<F::Proxy>>>> {
        // 锁中毒时继续使用内部数据
        self.peers.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// 注册节点，已知的 id 保持不变
    pub fn add_peers(&self, peers: impl IntoIterator<Item = RaftPeer>) {
        let mut slots = self.slots();
        for peer in peers {
            match slots.get(&peer.id) {
                Some(known) if known.peer.address != peer.address => {
                    warn!(
                        "peer {} already registered at {}, ignore new address {}",
                        peer.id, known.peer.address, peer.address
                    );
                }
                Some(_) => {}
                None => {
                    debug!("add peer {}", peer);
                    slots.insert(peer.id.clone(), Arc::new(PeerAndProxy::new(peer)));
                }
            }
        }
    }

    /// 获取连接句柄，不存在则创建；close 之后返回 [`Error::Closed`]
    pub async fn get_proxy(&self, id: &str) -> Result<Arc<F::Proxy>> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        let slot = self
            .slots()
            .get(id)
            .cloned()
            .ok_or_else(|| Error::UnknownPeer(id.to_string()))?;

        let proxy = slot
            .proxy
            .get_or_try_init(|| async {
                debug!("create proxy for peer {}", slot.peer);
                self.factory
                    .create_proxy(&slot.peer)
                    .await
                    .map(Arc::new)
                    .map_err(|e| match e {
                        e @ Error::ConnectionSetup { .. } => e,
                        e => Error::connection_setup(id, e),
                    })
            })
            .await?
            .clone();

        if self.is_closed() {
            // 建连期间 map 被关闭，close 可能没有看到这个连接
            if let Some(proxy) = slot.take_for_shutdown() {
                if let Err(e) = proxy.shutdown().await {
                    warn!("Got error when closing proxy with id {}: {}", id, e);
                }
            }
            return Err(Error::Closed);
        }
        Ok(proxy)
    }

    pub fn peer_ids(&self) -> Vec<PeerId> {
        let mut ids: Vec<PeerId> = self.slots().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// 关闭所有已建立的连接，单个失败不影响其它连接的关闭
    /// 返回关闭失败的节点及错误；之后不再创建连接，节点注册信息保留
    pub async fn close(&self) -> Vec<(PeerId, Error)> {
        let slots: Vec<(PeerId, Arc<PeerAndProxy<F::Proxy>>)> = {
            let slots = self.slots();
            self.closed.store(true, Ordering::SeqCst);
            slots
                .iter()
                .map(|(id, slot)| (id.clone(), slot.clone()))
                .collect()
        };

        let live = slots
            .into_iter()
            .filter_map(|(id, slot)| slot.take_for_shutdown().map(|proxy| (id, proxy)));
        let results = join_all(live.map(|(id, proxy)| async move {
            let res = proxy.shutdown().await;
            (id, res)
        }))
        .await;

        results
            .into_iter()
            .filter_map(|(id, res)| res.err().map(|e| (id, e)))
            .collect()
    }
}
