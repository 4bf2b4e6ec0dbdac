//! NUMA first-touch 用のスレッド束縛
//!
//! 並列クリアの各タスクは担当レンジを書き込む前に自分自身をCPUへ束縛する。
//! first-touch ポリシーの下では、最初に書き込んだスレッドのNUMAノードに
//! ページが配置されるため、この束縛がテーブル各部の物理配置を決める。
//!
//! Linux 以外では束縛は no-op となり、ページ配置はOSスケジューラ任せに
//! なる。マルチソケット環境ではリモートノードアクセスによる性能低下が
//! 起こりうる。

/// 呼び出し元スレッドをタスク番号から導いたCPUへ束縛する
#[cfg(target_os = "linux")]
pub(super) fn bind_this_thread(task_index: usize) {
    unsafe {
        let cpus = libc::sysconf(libc::_SC_NPROCESSORS_ONLN);
        if cpus <= 0 {
            return;
        }

        let mut set: libc::cpu_set_t = std::mem::zeroed();
        libc::CPU_ZERO(&mut set);
        libc::CPU_SET(task_index % cpus as usize, &mut set);

        // 失敗してもクリア自体は正しく完了する（配置が最適でなくなるだけ）
        let rc = libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &set);
        if rc != 0 {
            log::warn!("sched_setaffinity failed for clear task {task_index}");
        }
    }
}

#[cfg(not(target_os = "linux"))]
pub(super) fn bind_this_thread(_task_index: usize) {}
