//! 解码后端接口
//!
//! 每个编解码器实现 `DecoderBackend`，通过引擎构建器在运行时注册。
//! 引擎本身不实现任何编解码，仅负责调度与会话生命周期。
//!
//! 扩展名匹配只是软提示：调度器在第二轮会对所有剩余后端做暴力
//! 探测，因此每个后端的 `open` 必须自行嗅探流内容，不能只信任
//! 扩展名。

mod symphonia;
mod wav;

pub use symphonia::SymphoniaBackend;
pub use wav::WavBackend;

use crate::sample::Sample;

/// 解码后端身份信息
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct DecoderInfo {
    /// 短名称
    pub name: &'static str,

    /// 识别的文件扩展名（小写、不含点）
    pub extensions: &'static [&'static str],

    /// 人类可读描述
    pub description: &'static str,

    /// 作者
    pub author: &'static str,

    /// 主页
    pub url: &'static str,
}

/// 解码后端能力接口
///
/// 后端是长生命周期单例，不归属任何会话；逐流状态在 `open` 成功时
/// 存入会话的编解码状态槽，后续调用通过 `Any` 向下转型取回。
///
/// # 生命周期
///
/// - `init` 在引擎初始化时调用一次，返回false的后端被标记为不可用
/// - `quit` 在引擎退出时对所有可用后端调用一次
///
/// # open契约
///
/// 成功时后端必须：设置会话的实际格式与总时长、按需置位
/// `CANSEEK`、存入编解码状态。失败时必须不留任何会话状态；
/// 调度器负责把流位置回退到尝试前。
pub trait DecoderBackend: Send + Sync {
    /// 后端身份信息
    fn info(&self) -> &DecoderInfo;

    /// 全局初始化，返回后端是否可用
    fn init(&self) -> bool {
        true
    }

    /// 全局清理
    fn quit(&self) {}

    /// 尝试接管会话的字节流
    fn open(&self, sample: &mut Sample, ext_hint: Option<&str>) -> bool;

    /// 解码一块数据到会话缓冲区，返回产出字节数
    ///
    /// 0是合法结果：EAGAIN（暂无数据）或终止态（EOF/ERROR已由
    /// 后端置位）。
    fn read(&self, sample: &mut Sample) -> usize;

    /// 定位到指定毫秒处
    fn seek(&self, sample: &mut Sample, ms: u64) -> bool;

    /// 回到流起始位置
    fn rewind(&self, sample: &mut Sample) -> bool;

    /// 释放逐流状态（会话释放路径，先于字节流关闭）
    fn close(&self, sample: &mut Sample);
}
