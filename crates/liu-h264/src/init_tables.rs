//! CABAC 上下文初始化表.
//!
//! 每个 ctxIdx 对应一组线性模型参数 (m, n), 初始化时按
//! `preCtxState = clip3(1, 126, ((m * clip3(0, 51, sliceQPY)) >> 4) + n)`
//! 映射为概率状态. I/SI slice 使用固定列, P/SP/B slice 按
//! cabac_init_idc 三选一.
//!
//! 覆盖帧编码使用的 ctxIdx 0..460; 场编码 (MBAFF) 的 460..1024
//! 区段不在支持范围内.

/// 初始化表覆盖的 ctxIdx 数量
pub const INIT_CTX_COUNT: usize = 460;

/// I/SI slice 初始化参数 (m, n)
pub(crate) const INIT_I: [[i8; 2]; INIT_CTX_COUNT] = [
    // 0-10: mb_type (SI/I 前缀)
    [20, -15], [2, 54], [3, 74], [20, -15],
    [2, 54], [3, 74], [-28, 127], [-23, 104],
    [-6, 53], [-1, 54], [7, 51],
    // 11-23: mb_skip_flag / mb_type (P/SP)
    [23, 33], [23, 2], [21, 0], [1, 9],
    [0, 49], [-37, 118], [5, 57], [-13, 78],
    [-11, 65], [1, 62], [12, 49], [-4, 73],
    [17, 50],
    // 24-39: mb_skip_flag / mb_type / sub_mb_type (B)
    [18, 64], [9, 43], [29, 0], [26, 67],
    [16, 90], [9, 104], [-46, 127], [-20, 104],
    [1, 67], [-13, 78], [-11, 65], [1, 62],
    [-6, 86], [-17, 95], [-6, 61], [9, 45],
    // 40-53: mvd
    [-3, 69], [-6, 81], [-11, 96], [6, 55],
    [7, 67], [-5, 86], [2, 88], [0, 58],
    [-3, 76], [-10, 94], [5, 54], [4, 69],
    [-3, 81], [0, 88],
    // 54-59: ref_idx
    [-7, 67], [-5, 74], [-4, 74], [-5, 80],
    [-7, 72], [1, 58],
    // 60-69: mb_qp_delta / 色度预测模式等
    [0, 41], [0, 63], [0, 63], [0, 63],
    [-9, 83], [4, 86], [0, 97], [-7, 72],
    [13, 41], [3, 62],
    // 70-104: coded_block_pattern / coded_block_flag
    [0, 11], [1, 55], [0, 69], [-17, 127],
    [-13, 102], [0, 82], [-7, 74], [-21, 107],
    [-27, 127], [-31, 127], [-24, 127], [-18, 95],
    [-27, 127], [-21, 114], [-30, 127], [-17, 123],
    [-12, 115], [-16, 122], [-11, 115], [-12, 63],
    [-2, 68], [-15, 84], [-13, 104], [-3, 70],
    [-8, 93], [-10, 90], [-30, 127], [-1, 74],
    [-6, 97], [-7, 91], [-20, 127], [-4, 56],
    [-5, 82], [-7, 76], [-22, 125],
    // 105-165: significant_coeff_flag (帧)
    [-7, 93], [-11, 87], [-3, 77], [-5, 71],
    [-4, 63], [-4, 68], [-12, 84], [-7, 62],
    [-7, 65], [8, 61], [5, 56], [-2, 66],
    [1, 64], [0, 61], [-2, 78], [1, 50],
    [7, 52], [10, 35], [0, 44], [11, 38],
    [1, 45], [0, 46], [5, 44], [31, 17],
    [1, 51], [7, 50], [28, 19], [16, 33],
    [14, 62], [-13, 108], [-15, 100], [-13, 101],
    [-13, 91], [-12, 94], [-10, 88], [-16, 84],
    [-10, 86], [-7, 83], [-13, 87], [-19, 94],
    [1, 70], [0, 72], [-5, 74], [18, 59],
    [-8, 102], [-15, 100], [0, 95], [-4, 75],
    [2, 72], [-11, 75], [-3, 71], [15, 46],
    [-13, 69], [0, 62], [0, 65], [21, 37],
    [-15, 72], [9, 57], [16, 54], [0, 62],
    [12, 72],
    // 166-226: last_significant_coeff_flag (帧)
    [24, 0], [15, 9], [8, 25], [13, 18],
    [15, 9], [13, 19], [10, 37], [12, 18],
    [6, 29], [20, 33], [15, 30], [4, 45],
    [1, 58], [0, 62], [7, 61], [12, 38],
    [11, 45], [15, 39], [11, 42], [13, 44],
    [16, 45], [12, 41], [10, 49], [30, 34],
    [18, 42], [10, 55], [17, 51], [17, 46],
    [0, 89], [26, -19], [22, -17], [26, -17],
    [30, -25], [28, -20], [33, -23], [37, -27],
    [33, -23], [40, -28], [38, -17], [33, -11],
    [40, -15], [41, -6], [38, 1], [41, 17],
    [30, -6], [27, 3], [26, 22], [37, -16],
    [35, -4], [38, -8], [38, -3], [37, 3],
    [38, 5], [42, 0], [35, 16], [39, 22],
    [14, 48], [27, 37], [21, 60], [12, 68],
    [2, 97],
    // 227-275: coeff_abs_level_minus1
    [-3, 71], [-6, 42], [-5, 50], [-3, 54],
    [-2, 62], [0, 58], [1, 63], [-2, 72],
    [-1, 74], [-9, 91], [-5, 67], [-4, 76],
    [-4, 77], [-6, 76], [-2, 72], [-6, 66],
    [-6, 60], [-6, 50], [-9, 93], [-6, 60],
    [-5, 53], [-4, 86], [-2, 73], [-6, 62],
    [-8, 88], [-5, 82], [-3, 72], [-4, 72],
    [-4, 68], [-3, 76], [-2, 77], [1, 68],
    [-3, 75], [-1, 70], [-4, 72], [-6, 76],
    [-2, 71], [-9, 91], [-3, 74], [-2, 69],
    [-4, 78], [-5, 74], [-6, 76], [-7, 77],
    [-7, 78], [-8, 79], [-9, 82], [-10, 85],
    [-9, 86],
    // 276: end_of_slice_flag (固定终止状态, 见 context::initialize)
    [0, 0],
    // 277-337: significant_coeff_flag (场)
    [-7, 93], [-11, 87], [-3, 77], [-5, 71],
    [-4, 63], [-4, 68], [-12, 84], [-7, 62],
    [-7, 65], [8, 61], [5, 56], [-2, 66],
    [1, 64], [0, 61], [-2, 78], [1, 50],
    [7, 52], [10, 35], [0, 44], [11, 38],
    [1, 45], [0, 46], [5, 44], [31, 17],
    [1, 51], [7, 50], [28, 19], [16, 33],
    [14, 62], [-13, 108], [-15, 100], [-13, 101],
    [-13, 91], [-12, 94], [-10, 88], [-16, 84],
    [-10, 86], [-7, 83], [-13, 87], [-19, 94],
    [1, 70], [0, 72], [-5, 74], [18, 59],
    [-8, 102], [-15, 100], [0, 95], [-4, 75],
    [2, 72], [-11, 75], [-3, 71], [15, 46],
    [-13, 69], [0, 62], [0, 65], [21, 37],
    [-15, 72], [9, 57], [16, 54], [0, 62],
    [12, 72],
    // 338-398: last_significant_coeff_flag (场)
    [24, 0], [15, 9], [8, 25], [13, 18],
    [15, 9], [13, 19], [10, 37], [12, 18],
    [6, 29], [20, 33], [15, 30], [4, 45],
    [1, 58], [0, 62], [7, 61], [12, 38],
    [11, 45], [15, 39], [11, 42], [13, 44],
    [16, 45], [12, 41], [10, 49], [30, 34],
    [18, 42], [10, 55], [17, 51], [17, 46],
    [0, 89], [26, -19], [22, -17], [26, -17],
    [30, -25], [28, -20], [33, -23], [37, -27],
    [33, -23], [40, -28], [38, -17], [33, -11],
    [40, -15], [41, -6], [38, 1], [41, 17],
    [30, -6], [27, 3], [26, 22], [37, -16],
    [35, -4], [38, -8], [38, -3], [37, 3],
    [38, 5], [42, 0], [35, 16], [39, 22],
    [14, 48], [27, 37], [21, 60], [12, 68],
    [2, 97],
    // 399-401: transform_size_8x8_flag
    [31, 21], [31, 31], [25, 50],
    // 402-416: significant_coeff_flag (8x8 帧)
    [-17, 120], [-20, 112], [-18, 114], [-11, 85],
    [-15, 92], [-14, 89], [-26, 71], [-15, 81],
    [-14, 80], [0, 68], [-14, 70], [-24, 56],
    [-23, 68], [-24, 50], [-11, 74],
    // 417-425: last_significant_coeff_flag (8x8 帧)
    [23, -13], [26, -13], [40, -15], [49, -14],
    [44, 3], [45, 6], [44, 34], [33, 54],
    [19, 82],
    // 426-435: coeff_abs_level_minus1 (8x8)
    [-3, 75], [-1, 23], [1, 34], [1, 43],
    [0, 54], [-2, 55], [0, 61], [1, 64],
    [0, 68], [-9, 92],
    // 436-450: significant_coeff_flag (8x8 场)
    [-17, 120], [-20, 112], [-18, 114], [-11, 85],
    [-15, 92], [-14, 89], [-26, 71], [-15, 81],
    [-14, 80], [0, 68], [-14, 70], [-24, 56],
    [-23, 68], [-24, 50], [2, 59],
    // 451-459: last_significant_coeff_flag (8x8 场)
    [23, -13], [26, -13], [40, -15], [49, -14],
    [44, 3], [45, 6], [44, 34], [33, 54],
    [19, 82],
];

/// P/SP/B slice 初始化参数, 外层维度为 cabac_init_idc
pub(crate) const INIT_PB: [[[i8; 2]; INIT_CTX_COUNT]; 3] = [
    // cabac_init_idc = 0
    [
        // 0-10: mb_type (SI/I 前缀)
        [20, -15], [2, 54], [3, 74], [20, -15],
        [2, 54], [3, 74], [-28, 127], [-23, 104],
        [-6, 53], [-1, 54], [7, 51],
        // 11-23: mb_skip_flag / mb_type (P/SP)
        [23, 33], [23, 2], [21, 0], [1, 9],
        [0, 49], [-37, 118], [5, 57], [-13, 78],
        [-11, 65], [1, 62], [12, 49], [-4, 73],
        [17, 50],
        // 24-39: mb_skip_flag / mb_type / sub_mb_type (B)
        [18, 64], [9, 43], [29, 0], [26, 67],
        [16, 90], [9, 104], [-46, 127], [-20, 104],
        [1, 67], [-13, 78], [-11, 65], [1, 62],
        [-6, 86], [-17, 95], [-6, 61], [9, 45],
        // 40-53: mvd
        [-3, 69], [-6, 81], [-11, 96], [6, 55],
        [7, 67], [-5, 86], [2, 88], [0, 58],
        [-3, 76], [-10, 94], [5, 54], [4, 69],
        [-3, 81], [0, 88],
        // 54-59: ref_idx
        [-7, 67], [-5, 74], [-4, 74], [-5, 80],
        [-7, 72], [1, 58],
        // 60-69: mb_qp_delta / 色度预测模式等
        [0, 41], [0, 63], [0, 63], [0, 63],
        [-9, 83], [4, 86], [0, 97], [-7, 72],
        [13, 41], [3, 62],
        // 70-104: coded_block_pattern / coded_block_flag
        [0, 45], [-4, 78], [-3, 96], [-27, 126],
        [-28, 98], [-25, 101], [-23, 67], [-28, 82],
        [-20, 94], [-16, 83], [-22, 110], [-21, 91],
        [-18, 102], [-13, 93], [-29, 127], [-7, 92],
        [-5, 89], [-7, 96], [-13, 108], [-3, 46],
        [-1, 65], [-1, 57], [-9, 93], [-3, 74],
        [-9, 92], [-8, 87], [-23, 126], [5, 54],
        [6, 60], [6, 59], [6, 69], [-1, 48],
        [0, 68], [-4, 69], [-8, 88],
        // 105-165: significant_coeff_flag (帧)
        [-2, 85], [-6, 78], [-1, 75], [-7, 77],
        [2, 54], [5, 50], [-3, 68], [1, 50],
        [6, 42], [-4, 81], [1, 63], [-4, 70],
        [0, 67], [2, 57], [-2, 76], [11, 35],
        [4, 64], [1, 61], [11, 35], [18, 25],
        [12, 24], [13, 29], [13, 36], [-10, 93],
        [-7, 73], [-2, 73], [13, 46], [9, 49],
        [-7, 100], [9, 53], [2, 53], [5, 53],
        [-2, 61], [0, 56], [0, 56], [-13, 63],
        [-5, 60], [-1, 62], [4, 57], [-6, 69],
        [4, 57], [14, 39], [4, 51], [13, 68],
        [3, 64], [1, 61], [9, 63], [7, 50],
        [16, 39], [5, 44], [4, 52], [11, 48],
        [-5, 60], [-1, 59], [0, 59], [22, 33],
        [5, 44], [14, 43], [-1, 78], [0, 60],
        [9, 69],
        // 166-226: last_significant_coeff_flag (帧)
        [11, 28], [2, 40], [3, 44], [0, 49],
        [0, 46], [2, 44], [2, 51], [0, 47],
        [4, 39], [2, 62], [6, 46], [0, 54],
        [3, 54], [2, 58], [4, 63], [6, 51],
        [6, 57], [7, 53], [6, 52], [6, 55],
        [11, 45], [14, 36], [8, 53], [-1, 82],
        [7, 55], [-3, 78], [15, 46], [22, 31],
        [-1, 84], [25, 7], [30, -7], [28, 3],
        [28, 4], [32, 0], [34, -1], [30, 6],
        [30, 6], [32, 9], [31, 19], [26, 27],
        [26, 30], [37, 20], [28, 34], [17, 70],
        [1, 67], [5, 59], [9, 67], [16, 30],
        [18, 32], [18, 35], [22, 29], [24, 31],
        [23, 38], [18, 43], [20, 41], [11, 63],
        [9, 59], [9, 64], [-1, 94], [-2, 89],
        [-9, 108],
        // 227-275: coeff_abs_level_minus1
        [-6, 76], [-2, 44], [0, 45], [0, 52],
        [-3, 64], [-2, 59], [-4, 70], [-4, 75],
        [-8, 82], [-17, 102], [-9, 77], [3, 24],
        [0, 42], [0, 48], [0, 55], [-6, 59],
        [-7, 71], [-12, 83], [-11, 87], [-30, 119],
        [1, 58], [-3, 29], [-1, 36], [1, 38],
        [2, 43], [-6, 55], [0, 58], [0, 64],
        [-3, 74], [-10, 90], [0, 70], [-4, 29],
        [5, 31], [7, 42], [1, 59], [-2, 58],
        [-3, 72], [-3, 81], [-11, 97], [0, 58],
        [8, 5], [10, 14], [14, 18], [13, 27],
        [2, 40], [0, 58], [-3, 70], [-6, 79],
        [-8, 85],
        // 276: end_of_slice_flag (固定终止状态, 见 context::initialize)
        [0, 0],
        // 277-337: significant_coeff_flag (场)
        [-2, 85], [-6, 78], [-1, 75], [-7, 77],
        [2, 54], [5, 50], [-3, 68], [1, 50],
        [6, 42], [-4, 81], [1, 63], [-4, 70],
        [0, 67], [2, 57], [-2, 76], [11, 35],
        [4, 64], [1, 61], [11, 35], [18, 25],
        [12, 24], [13, 29], [13, 36], [-10, 93],
        [-7, 73], [-2, 73], [13, 46], [9, 49],
        [-7, 100], [9, 53], [2, 53], [5, 53],
        [-2, 61], [0, 56], [0, 56], [-13, 63],
        [-5, 60], [-1, 62], [4, 57], [-6, 69],
        [4, 57], [14, 39], [4, 51], [13, 68],
        [3, 64], [1, 61], [9, 63], [7, 50],
        [16, 39], [5, 44], [4, 52], [11, 48],
        [-5, 60], [-1, 59], [0, 59], [22, 33],
        [5, 44], [14, 43], [-1, 78], [0, 60],
        [9, 69],
        // 338-398: last_significant_coeff_flag (场)
        [11, 28], [2, 40], [3, 44], [0, 49],
        [0, 46], [2, 44], [2, 51], [0, 47],
        [4, 39], [2, 62], [6, 46], [0, 54],
        [3, 54], [2, 58], [4, 63], [6, 51],
        [6, 57], [7, 53], [6, 52], [6, 55],
        [11, 45], [14, 36], [8, 53], [-1, 82],
        [7, 55], [-3, 78], [15, 46], [22, 31],
        [-1, 84], [25, 7], [30, -7], [28, 3],
        [28, 4], [32, 0], [34, -1], [30, 6],
        [30, 6], [32, 9], [31, 19], [26, 27],
        [26, 30], [37, 20], [28, 34], [17, 70],
        [1, 67], [5, 59], [9, 67], [16, 30],
        [18, 32], [18, 35], [22, 29], [24, 31],
        [23, 38], [18, 43], [20, 41], [11, 63],
        [9, 59], [9, 64], [-1, 94], [-2, 89],
        [-9, 108],
        // 399-401: transform_size_8x8_flag
        [12, 40], [11, 51], [14, 59],
        // 402-416: significant_coeff_flag (8x8 帧)
        [-13, 106], [-16, 106], [-10, 87], [-21, 114],
        [-18, 110], [-14, 98], [-22, 110], [-21, 106],
        [-18, 103], [-21, 107], [-23, 108], [-26, 112],
        [-10, 96], [-12, 95], [-5, 91],
        // 417-425: last_significant_coeff_flag (8x8 帧)
        [-9, 93], [-22, 94], [-5, 86], [9, 67],
        [-4, 80], [-10, 85], [-1, 70], [7, 60],
        [9, 58],
        // 426-435: coeff_abs_level_minus1 (8x8)
        [5, 61], [12, 50], [15, 50], [18, 49],
        [17, 54], [10, 41], [7, 46], [-1, 51],
        [7, 49], [8, 52],
        // 436-450: significant_coeff_flag (8x8 场)
        [-13, 106], [-16, 106], [-10, 87], [-21, 114],
        [-18, 110], [-14, 98], [-22, 110], [-21, 106],
        [-18, 103], [-21, 107], [-23, 108], [-26, 112],
        [-10, 96], [-12, 95], [2, 59],
        // 451-459: last_significant_coeff_flag (8x8 场)
        [-9, 93], [-22, 94], [-5, 86], [9, 67],
        [-4, 80], [-10, 85], [-1, 70], [7, 60],
        [9, 58],
    ],
    // cabac_init_idc = 1
    [
        // 0-10: mb_type (SI/I 前缀)
        [20, -15], [2, 54], [3, 74], [20, -15],
        [2, 54], [3, 74], [-28, 127], [-23, 104],
        [-6, 53], [-1, 54], [7, 51],
        // 11-23: mb_skip_flag / mb_type (P/SP)
        [22, 25], [34, 0], [16, 0], [-2, 9],
        [4, 41], [-29, 118], [2, 65], [-6, 71],
        [-13, 79], [5, 52], [9, 50], [-3, 70],
        [10, 54],
        // 24-39: mb_skip_flag / mb_type / sub_mb_type (B)
        [26, 34], [9, 43], [40, 0], [57, 2],
        [41, 36], [26, 69], [-45, 127], [-15, 101],
        [-4, 76], [-6, 71], [-13, 79], [5, 52],
        [6, 69], [-13, 90], [0, 52], [8, 43],
        // 40-53: mvd
        [-2, 69], [-5, 82], [-10, 96], [2, 59],
        [2, 75], [-3, 87], [-3, 100], [1, 56],
        [-3, 74], [-6, 85], [0, 59], [-3, 81],
        [-7, 86], [-5, 95],
        // 54-59: ref_idx
        [-1, 66], [-1, 77], [1, 70], [-2, 86],
        [-5, 72], [0, 61],
        // 60-69: mb_qp_delta / 色度预测模式等
        [0, 41], [0, 63], [0, 63], [0, 63],
        [-9, 83], [4, 86], [0, 97], [-7, 72],
        [13, 41], [3, 62],
        // 70-104: coded_block_pattern / coded_block_flag
        [13, 15], [7, 51], [2, 80], [-39, 127],
        [-18, 91], [-17, 96], [-26, 81], [-35, 98],
        [-24, 102], [-23, 97], [-27, 119], [-24, 99],
        [-21, 110], [-18, 102], [-36, 127], [0, 80],
        [-5, 89], [-7, 94], [-4, 92], [0, 39],
        [0, 65], [-15, 84], [-35, 127], [-2, 73],
        [-12, 104], [-9, 91], [-31, 127], [3, 55],
        [7, 56], [7, 55], [8, 61], [-3, 53],
        [0, 68], [-7, 74], [-9, 88],
        // 105-165: significant_coeff_flag (帧)
        [-13, 103], [-13, 91], [-9, 89], [-14, 92],
        [-8, 76], [-12, 87], [-23, 110], [-24, 105],
        [-10, 78], [-20, 112], [-17, 99], [-78, 127],
        [-70, 127], [-50, 127], [-46, 127], [-4, 66],
        [-5, 78], [-4, 71], [-8, 72], [2, 59],
        [-1, 55], [-7, 70], [-6, 75], [-8, 89],
        [-34, 119], [-3, 75], [32, 20], [30, 22],
        [-44, 127], [0, 54], [-5, 61], [0, 58],
        [-1, 60], [-3, 61], [-8, 67], [-25, 84],
        [-14, 74], [-5, 65], [5, 52], [2, 57],
        [0, 61], [-9, 69], [-11, 70], [18, 55],
        [-4, 71], [0, 58], [7, 61], [9, 41],
        [18, 25], [9, 32], [5, 43], [9, 47],
        [0, 44], [0, 51], [2, 46], [19, 38],
        [-4, 66], [15, 38], [12, 42], [9, 34],
        [0, 89],
        // 166-226: last_significant_coeff_flag (帧)
        [4, 45], [10, 28], [10, 31], [33, -11],
        [52, -43], [18, 15], [28, 0], [35, -22],
        [38, -25], [34, 0], [39, -18], [32, -12],
        [102, -94], [0, 0], [56, -15], [33, -4],
        [29, 10], [37, -5], [51, -29], [39, -9],
        [52, -34], [69, -58], [67, -63], [44, -5],
        [32, 7], [55, -29], [32, 1], [0, 0],
        [27, 36], [33, -25], [34, -30], [36, -28],
        [38, -28], [38, -27], [34, -18], [35, -16],
        [34, -14], [32, -8], [37, -6], [35, 0],
        [30, 10], [28, 18], [26, 25], [29, 41],
        [0, 75], [2, 72], [8, 77], [14, 35],
        [18, 31], [17, 35], [21, 30], [17, 45],
        [20, 42], [18, 45], [27, 26], [16, 54],
        [7, 66], [16, 56], [11, 73], [10, 67],
        [-10, 116],
        // 227-275: coeff_abs_level_minus1
        [-23, 112], [-15, 71], [-7, 61], [0, 53],
        [-5, 66], [-11, 77], [-9, 80], [-9, 84],
        [-10, 87], [-34, 127], [-21, 101], [-3, 39],
        [-5, 53], [-7, 61], [-11, 75], [-15, 77],
        [-17, 91], [-25, 107], [-25, 111], [-28, 122],
        [-11, 76], [-10, 44], [-10, 52], [-10, 57],
        [-9, 58], [-16, 72], [-7, 69], [-4, 69],
        [-5, 74], [-9, 86], [2, 66], [-9, 34],
        [1, 32], [11, 31], [5, 52], [-2, 55],
        [-2, 67], [0, 73], [-8, 89], [3, 52],
        [7, 4], [10, 8], [17, 8], [16, 19],
        [3, 37], [-1, 61], [-5, 73], [1, 64],
        [-6, 75],
        // 276: end_of_slice_flag (固定终止状态, 见 context::initialize)
        [0, 0],
        // 277-337: significant_coeff_flag (场)
        [-13, 103], [-13, 91], [-9, 89], [-14, 92],
        [-8, 76], [-12, 87], [-23, 110], [-24, 105],
        [-10, 78], [-20, 112], [-17, 99], [-78, 127],
        [-70, 127], [-50, 127], [-46, 127], [-4, 66],
        [-5, 78], [-4, 71], [-8, 72], [2, 59],
        [-1, 55], [-7, 70], [-6, 75], [-8, 89],
        [-34, 119], [-3, 75], [32, 20], [30, 22],
        [-44, 127], [0, 54], [-5, 61], [0, 58],
        [-1, 60], [-3, 61], [-8, 67], [-25, 84],
        [-14, 74], [-5, 65], [5, 52], [2, 57],
        [0, 61], [-9, 69], [-11, 70], [18, 55],
        [-4, 71], [0, 58], [7, 61], [9, 41],
        [18, 25], [9, 32], [5, 43], [9, 47],
        [0, 44], [0, 51], [2, 46], [19, 38],
        [-4, 66], [15, 38], [12, 42], [9, 34],
        [0, 89],
        // 338-398: last_significant_coeff_flag (场)
        [4, 45], [10, 28], [10, 31], [33, -11],
        [52, -43], [18, 15], [28, 0], [35, -22],
        [38, -25], [34, 0], [39, -18], [32, -12],
        [102, -94], [0, 0], [56, -15], [33, -4],
        [29, 10], [37, -5], [51, -29], [39, -9],
        [52, -34], [69, -58], [67, -63], [44, -5],
        [32, 7], [55, -29], [32, 1], [0, 0],
        [27, 36], [33, -25], [34, -30], [36, -28],
        [38, -28], [38, -27], [34, -18], [35, -16],
        [34, -14], [32, -8], [37, -6], [35, 0],
        [30, 10], [28, 18], [26, 25], [29, 41],
        [0, 75], [2, 72], [8, 77], [14, 35],
        [18, 31], [17, 35], [21, 30], [17, 45],
        [20, 42], [18, 45], [27, 26], [16, 54],
        [7, 66], [16, 56], [11, 73], [10, 67],
        [-10, 116],
        // 399-401: transform_size_8x8_flag
        [25, 32], [21, 49], [21, 54],
        // 402-416: significant_coeff_flag (8x8 帧)
        [-4, 79], [-7, 71], [-5, 69], [-9, 70],
        [-8, 66], [-10, 68], [-19, 73], [-12, 69],
        [-16, 70], [-15, 67], [-20, 62], [-19, 70],
        [-16, 66], [-22, 65], [-20, 63],
        // 417-425: last_significant_coeff_flag (8x8 帧)
        [9, -2], [26, -9], [33, -9], [39, -7],
        [41, -2], [45, 3], [49, 9], [45, 27],
        [36, 59],
        // 426-435: coeff_abs_level_minus1 (8x8)
        [-6, 66], [-7, 35], [-7, 42], [-8, 45],
        [-5, 48], [-12, 56], [-6, 60], [-5, 62],
        [-8, 66], [-8, 76],
        // 436-450: significant_coeff_flag (8x8 场)
        [-4, 79], [-7, 71], [-5, 69], [-9, 70],
        [-8, 66], [-10, 68], [-19, 73], [-12, 69],
        [-16, 70], [-15, 67], [-20, 62], [-19, 70],
        [-16, 66], [-22, 65], [2, 58],
        // 451-459: last_significant_coeff_flag (8x8 场)
        [9, -2], [26, -9], [33, -9], [39, -7],
        [41, -2], [45, 3], [49, 9], [45, 27],
        [36, 59],
    ],
    // cabac_init_idc = 2
    [
        // 0-10: mb_type (SI/I 前缀)
        [20, -15], [2, 54], [3, 74], [20, -15],
        [2, 54], [3, 74], [-28, 127], [-23, 104],
        [-6, 53], [-1, 54], [7, 51],
        // 11-23: mb_skip_flag / mb_type (P/SP)
        [29, 16], [25, 0], [14, 0], [-10, 51],
        [-3, 62], [-27, 99], [26, 16], [-4, 85],
        [-24, 102], [5, 57], [6, 57], [-17, 73],
        [14, 57],
        // 24-39: mb_skip_flag / mb_type / sub_mb_type (B)
        [20, 40], [9, 43], [29, 0], [54, 0],
        [37, 42], [12, 97], [-32, 127], [-22, 117],
        [-2, 74], [-4, 85], [-24, 102], [5, 57],
        [-6, 93], [-14, 88], [-6, 44], [4, 55],
        // 40-53: mvd
        [-11, 89], [-15, 103], [-21, 116], [19, 57],
        [20, 58], [4, 84], [6, 96], [1, 63],
        [-5, 85], [-13, 106], [5, 63], [6, 75],
        [-3, 90], [-1, 101],
        // 54-59: ref_idx
        [3, 55], [-4, 79], [-2, 75], [-12, 97],
        [-7, 50], [1, 60],
        // 60-69: mb_qp_delta / 色度预测模式等
        [0, 41], [0, 63], [0, 63], [0, 63],
        [-9, 83], [4, 86], [0, 97], [-7, 72],
        [13, 41], [3, 62],
        // 70-104: coded_block_pattern / coded_block_flag
        [7, 34], [-9, 88], [-20, 127], [-36, 127],
        [-17, 91], [-14, 95], [-25, 84], [-25, 86],
        [-12, 89], [-17, 91], [-31, 127], [-14, 76],
        [-18, 103], [-13, 90], [-37, 127], [11, 80],
        [5, 76], [2, 84], [5, 78], [-6, 55],
        [4, 61], [-14, 83], [-37, 127], [-5, 79],
        [-11, 104], [-11, 91], [-30, 127], [0, 65],
        [-2, 79], [0, 72], [-4, 92], [-6, 56],
        [3, 68], [-8, 71], [-13, 98],
        // 105-165: significant_coeff_flag (帧)
        [-4, 86], [-12, 88], [-5, 82], [-3, 72],
        [-4, 67], [-8, 72], [-16, 89], [-9, 69],
        [-1, 59], [5, 66], [4, 57], [-4, 71],
        [-2, 71], [2, 58], [-1, 74], [-4, 44],
        [-1, 69], [0, 62], [-7, 51], [-4, 47],
        [-6, 42], [-3, 41], [-6, 53], [8, 76],
        [-9, 78], [-11, 83], [9, 52], [0, 67],
        [-5, 90], [1, 67], [-15, 72], [-5, 75],
        [-8, 80], [-21, 83], [-21, 64], [-13, 31],
        [-25, 64], [-29, 94], [9, 75], [17, 63],
        [-8, 74], [-5, 35], [-2, 27], [13, 91],
        [3, 65], [-7, 69], [8, 77], [-10, 66],
        [3, 62], [-3, 68], [-20, 81], [0, 30],
        [1, 7], [-3, 23], [-21, 74], [16, 66],
        [-23, 124], [17, 37], [44, -18], [50, -34],
        [-22, 127],
        // 166-226: last_significant_coeff_flag (帧)
        [4, 39], [0, 42], [7, 34], [11, 29],
        [8, 31], [6, 37], [7, 42], [3, 40],
        [8, 33], [13, 43], [13, 36], [4, 47],
        [3, 55], [2, 58], [6, 60], [8, 44],
        [11, 44], [14, 42], [7, 48], [4, 56],
        [4, 52], [13, 37], [9, 49], [19, 58],
        [10, 48], [12, 45], [0, 69], [20, 33],
        [8, 63], [35, -18], [33, -25], [28, -3],
        [24, 10], [27, 0], [34, -14], [52, -44],
        [39, -24], [19, 17], [31, 25], [36, 29],
        [24, 33], [34, 15], [30, 20], [22, 73],
        [20, 34], [19, 31], [27, 44], [19, 16],
        [15, 36], [15, 36], [21, 28], [25, 21],
        [30, 20], [31, 12], [27, 16], [24, 42],
        [0, 93], [14, 56], [15, 57], [26, 38],
        [-24, 127],
        // 227-275: coeff_abs_level_minus1
        [-24, 115], [-22, 82], [-9, 62], [0, 53],
        [0, 59], [-14, 85], [-13, 89], [-13, 94],
        [-11, 92], [-29, 127], [-21, 100], [-14, 57],
        [-12, 67], [-11, 71], [-10, 77], [-21, 85],
        [-16, 88], [-23, 104], [-15, 98], [-37, 127],
        [-10, 82], [-8, 48], [-8, 61], [-8, 66],
        [-7, 70], [-14, 75], [-10, 79], [-9, 83],
        [-12, 92], [-18, 108], [-4, 79], [-22, 69],
        [-16, 75], [-2, 58], [1, 58], [-13, 78],
        [-9, 83], [-4, 81], [-13, 99], [-13, 81],
        [-6, 38], [-13, 62], [-6, 58], [-2, 59],
        [-16, 73], [-10, 76], [-13, 86], [-9, 83],
        [-10, 87],
        // 276: end_of_slice_flag (固定终止状态, 见 context::initialize)
        [0, 0],
        // 277-337: significant_coeff_flag (场)
        [-4, 86], [-12, 88], [-5, 82], [-3, 72],
        [-4, 67], [-8, 72], [-16, 89], [-9, 69],
        [-1, 59], [5, 66], [4, 57], [-4, 71],
        [-2, 71], [2, 58], [-1, 74], [-4, 44],
        [-1, 69], [0, 62], [-7, 51], [-4, 47],
        [-6, 42], [-3, 41], [-6, 53], [8, 76],
        [-9, 78], [-11, 83], [9, 52], [0, 67],
        [-5, 90], [1, 67], [-15, 72], [-5, 75],
        [-8, 80], [-21, 83], [-21, 64], [-13, 31],
        [-25, 64], [-29, 94], [9, 75], [17, 63],
        [-8, 74], [-5, 35], [-2, 27], [13, 91],
        [3, 65], [-7, 69], [8, 77], [-10, 66],
        [3, 62], [-3, 68], [-20, 81], [0, 30],
        [1, 7], [-3, 23], [-21, 74], [16, 66],
        [-23, 124], [17, 37], [44, -18], [50, -34],
        [-22, 127],
        // 338-398: last_significant_coeff_flag (场)
        [4, 39], [0, 42], [7, 34], [11, 29],
        [8, 31], [6, 37], [7, 42], [3, 40],
        [8, 33], [13, 43], [13, 36], [4, 47],
        [3, 55], [2, 58], [6, 60], [8, 44],
        [11, 44], [14, 42], [7, 48], [4, 56],
        [4, 52], [13, 37], [9, 49], [19, 58],
        [10, 48], [12, 45], [0, 69], [20, 33],
        [8, 63], [35, -18], [33, -25], [28, -3],
        [24, 10], [27, 0], [34, -14], [52, -44],
        [39, -24], [19, 17], [31, 25], [36, 29],
        [24, 33], [34, 15], [30, 20], [22, 73],
        [20, 34], [19, 31], [27, 44], [19, 16],
        [15, 36], [15, 36], [21, 28], [25, 21],
        [30, 20], [31, 12], [27, 16], [24, 42],
        [0, 93], [14, 56], [15, 57], [26, 38],
        [-24, 127],
        // 399-401: transform_size_8x8_flag
        [21, 33], [19, 50], [17, 61],
        // 402-416: significant_coeff_flag (8x8 帧)
        [-21, 126], [-23, 124], [-20, 110], [-26, 126],
        [-25, 124], [-17, 105], [-27, 121], [-27, 117],
        [-17, 102], [-26, 117], [-27, 116], [-33, 122],
        [-10, 95], [-14, 100], [-8, 95],
        // 417-425: last_significant_coeff_flag (8x8 帧)
        [-17, 111], [-28, 114], [-6, 89], [-2, 80],
        [-4, 82], [-9, 85], [-8, 81], [-1, 72],
        [5, 64],
        // 426-435: coeff_abs_level_minus1 (8x8)
        [1, 67], [0, 68], [-10, 67], [1, 68],
        [0, 77], [2, 64], [0, 68], [-5, 78],
        [2, 49], [1, 50],
        // 436-450: significant_coeff_flag (8x8 场)
        [-21, 126], [-23, 124], [-20, 110], [-26, 126],
        [-25, 124], [-17, 105], [-27, 121], [-27, 117],
        [-17, 102], [-26, 117], [-27, 116], [-33, 122],
        [-10, 95], [-14, 100], [-11, 68],
        // 451-459: last_significant_coeff_flag (8x8 场)
        [-17, 111], [-28, 114], [-6, 89], [-2, 80],
        [-4, 82], [-9, 85], [-8, 81], [-1, 72],
        [5, 64],
    ],
];
