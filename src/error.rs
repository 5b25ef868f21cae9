//! 错误类型定义
//!
//! 提供卷操作与块搬迁引擎的错误类型。

use core::fmt;

use crate::consts::{EX_DEVICE, EX_OSERR, EX_USAGE};

/// 卷 / 搬迁操作错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    kind: ErrorKind,
    message: &'static str,
    /// 出错的块地址（已知时）
    block: Option<u64>,
    /// 出错的 inode 编号（已知时）
    inode: Option<u32>,
    /// 在任何修改之前拒绝
    precondition: bool,
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// I/O 错误
    Io,
    /// 无效参数（包括保留区未按块对齐）
    InvalidInput,
    /// 文件系统不一致（位图标记已分配，但找不到所属 inode）
    Corrupted,
    /// 卷只读
    PermissionDenied,
    /// 对象不存在
    NotFound,
    /// 已存在
    AlreadyExists,
    /// 保留区之外空闲空间不足
    NoSpace,
    /// 找不到可用的替换块
    AllocFailed,
    /// 不支持的操作
    Unsupported,
    /// 无效状态（例如卷需要先做一致性检查）
    InvalidState,
    /// 结束时持久化位图 / inode 失败，磁盘状态可能不一致
    Persist,
}

impl Error {
    /// 创建新错误
    pub const fn new(kind: ErrorKind, message: &'static str) -> Self {
        Self {
            kind,
            message,
            block: None,
            inode: None,
            precondition: false,
        }
    }

    /// 附加出错的块地址
    pub const fn at_block(mut self, block: u64) -> Self {
        self.block = Some(block);
        self
    }

    /// 附加出错的 inode 编号
    pub const fn for_inode(mut self, ino: u32) -> Self {
        self.inode = Some(ino);
        self
    }

    /// 标记为前置条件错误（卷尚未被修改）
    pub const fn as_precondition(mut self) -> Self {
        self.precondition = true;
        self
    }

    /// 转换为持久化错误，保留原消息和上下文
    pub const fn into_persist(mut self) -> Self {
        self.kind = ErrorKind::Persist;
        self.precondition = false;
        self
    }

    /// 获取错误类型
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// 获取错误消息
    pub const fn message(&self) -> &'static str {
        self.message
    }

    /// 出错的块地址
    pub const fn block(&self) -> Option<u64> {
        self.block
    }

    /// 出错的 inode 编号
    pub const fn inode(&self) -> Option<u32> {
        self.inode
    }

    /// 是否是前置条件错误
    ///
    /// 前置条件错误在任何修改之前报告，修正参数后重新调用即可。
    /// 运行中途出现的同类错误不算。
    pub const fn is_precondition(&self) -> bool {
        self.precondition
    }

    /// 进程退出码
    ///
    /// 对应 e2blk 的 `EX_USAGE` / `EX_OSERR` / `EX_DEVICE`
    pub const fn exit_code(&self) -> i32 {
        match self.kind {
            ErrorKind::Persist => EX_DEVICE,
            _ if self.is_precondition() => EX_USAGE,
            _ => EX_OSERR,
        }
    }

    /// 给操作员的提示
    pub const fn advice(&self) -> &'static str {
        match self.kind {
            ErrorKind::Persist => {
                "the volume may be inconsistent on disk; run a filesystem check before reuse"
            }
            _ if self.is_precondition() => "correct the parameters and run again",
            _ => {
                "interrupted runs may leave data relocated but the region not fully evacuated; re-run to continue"
            }
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)?;
        if let Some(block) = self.block {
            write!(f, " (block {})", block)?;
        }
        if let Some(ino) = self.inode {
            write!(f, " (inode {})", ino)?;
        }
        Ok(())
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result 类型别名
pub type Result<T> = core::result::Result<T, Error>;
